#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const SOURCE: &str = "\
module Plot

open System

NEW_CELL
let radius = 2.0

NEW_CELL
let area = Math.PI * radius * radius
printfn \"%f\" area
";

pub const PYTHON: &str = "\
from __future__ import annotations
from math import pi
from fable_modules.fable_library.string import (to_console, printf)
import numpy as np

# %%
radius = 2.0

# %%
area = pi * radius * radius

to_console(printf(\"%f\"))(area)
";

/// Write `Plot.fsx` and its compiled `Plot.py`, with the Python file `python_age`
/// newer (positive) or older (negative) than the source, in seconds.
pub fn write_pair(dir: &Path, python_age: i64) -> PathBuf {
    let source = dir.join("Plot.fsx");
    let python = dir.join("Plot.py");
    fs::write(&source, SOURCE).expect("write source");
    fs::write(&python, PYTHON).expect("write python");

    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let python_time = if python_age >= 0 {
        base + Duration::from_secs(python_age as u64)
    } else {
        base - Duration::from_secs(python_age.unsigned_abs())
    };
    set_modified(&source, base);
    set_modified(&python, python_time);
    source
}

pub fn set_modified(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(time))
        .expect("set modification time");
}

/// Byte offset of the first occurrence of `needle` in the sample source.
pub fn offset_of(needle: &str) -> usize {
    SOURCE.find(needle).expect("needle in sample source")
}
