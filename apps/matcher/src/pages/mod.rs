//! Pages: one per workflow location. Each page resolves to a [`ViewState`]
//! from nothing but the identifier in its location, so every stage can be
//! opened directly.

pub mod requirements;
pub mod results;
pub mod upload_cvs;
pub mod upload_jd;

use std::path::PathBuf;

use colored::{Color, Colorize};

use crate::errors::AppError;
use crate::transport::UploadFile;

/// What a page shows once its load has settled. Every variant renders as
/// distinct, non-blank text. While the load is in flight the command shows a
/// spinner instead.
#[derive(Debug)]
pub enum ViewState<T> {
    Error(AppError),
    /// The call succeeded but there is nothing to show yet.
    Empty(String),
    Ready(T),
}

impl<T> ViewState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a failed load into its error; other states pass through.
    pub fn into_result(self) -> Result<ViewState<T>, AppError> {
        match self {
            ViewState::Error(error) => Err(error),
            other => Ok(other),
        }
    }

    pub fn render_with(&self, theme: &Theme, ready: impl FnOnce(&T) -> String) -> String {
        match self {
            ViewState::Error(error) => theme.paint(&format!("Error: {error}"), Color::Red),
            ViewState::Empty(message) => theme.paint(message, Color::Yellow),
            ViewState::Ready(value) => ready(value),
        }
    }
}

/// Terminal styling. Tests render with colours off.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    use_colors: bool,
}

impl Theme {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn heading(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().underline().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn label(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Reads local files for upload, failing on the first unreadable path.
pub async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>, AppError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = UploadFile::from_path(path).await.map_err(|source| AppError::Io {
            path: path.display().to_string(),
            source,
        })?;
        files.push(file);
    }
    Ok(files)
}
