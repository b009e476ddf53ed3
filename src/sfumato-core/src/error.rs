// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{stage}: expected a {expected} Hz buffer, got {actual} Hz")]
    RateMismatch {
        stage: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("Buffer length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::RateMismatch`] unless `actual` equals `expected`.
pub(crate) fn check_rate(stage: &'static str, expected: u32, actual: u32) -> Result<()> {
    if expected != actual {
        return Err(Error::RateMismatch {
            stage,
            expected,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::LengthMismatch { expected, actual });
    }
    Ok(())
}
