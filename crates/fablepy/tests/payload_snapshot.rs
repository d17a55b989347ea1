mod common;

use async_trait::async_trait;
use fablepy::app::runner::{CellRunner, CellSettings, ExecutionBackend};
use fablepy::infra::document::{Cursor, FileDocument};
use fablepy::infra::fs::DiskFs;
use insta::assert_snapshot;

struct Discard;

#[async_trait]
impl ExecutionBackend for Discard {
    async fn execute(&self, _payload: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn fable_cell_payload() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let document =
        FileDocument::open(&source, Cursor::Offset(common::offset_of("printfn"))).await?;
    let runner = CellRunner::new(DiskFs, Discard, CellSettings::default());

    let payload = runner
        .preview_cell(&document)
        .await?
        .expect("cursor is inside a cell");
    assert_snapshot!("fable_cell_payload", payload.text);
    Ok(())
}
