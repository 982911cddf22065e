//! Screenshot evidence written to the run directory

use crate::guards::stabilize;
use crate::page::Page;
use journey_core::{JourneyError, Result, Timeouts};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Screenshot capture options
#[derive(Debug, Clone, Copy)]
pub struct ScreenshotOptions {
    /// Capture beyond the viewport
    pub full_page: bool,
    /// Wait for a stable page before capturing
    pub stabilize: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            full_page: true,
            stabilize: false,
        }
    }
}

impl ScreenshotOptions {
    /// Step evidence: full page, no extra waiting
    pub fn step() -> Self {
        Self::default()
    }

    /// Setup evidence: full page after stabilization
    pub fn stabilized() -> Self {
        Self {
            full_page: true,
            stabilize: true,
        }
    }
}

/// Capture a PNG screenshot into `path`, creating parent directories
pub async fn capture_to_file(
    page: &dyn Page,
    path: &Path,
    options: ScreenshotOptions,
    timeouts: &Timeouts,
) -> Result<PathBuf> {
    if options.stabilize {
        stabilize(page, timeouts).await;
    }
    debug!("Capturing screenshot (full_page: {})", options.full_page);
    let data = page.screenshot(options.full_page).await?;
    if data.is_empty() {
        return Err(JourneyError::Evidence(format!(
            "empty screenshot for {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &data).await?;
    info!("Screenshot stored: {} ({} bytes)", path.display(), data.len());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    #[test]
    fn test_screenshot_options() {
        assert!(ScreenshotOptions::step().full_page);
        assert!(!ScreenshotOptions::step().stabilize);
        assert!(ScreenshotOptions::stabilized().stabilize);
    }

    #[tokio::test]
    async fn test_capture_to_file() {
        let temp = tempfile::tempdir().unwrap();
        let page = MockPage::new("https://shop.example/");
        let path = temp.path().join("screenshots").join("TC-01_Step-1_click.png");
        let written = capture_to_file(&page, &path, ScreenshotOptions::step(), &Timeouts::immediate())
            .await
            .unwrap();
        assert_eq!(written, path);
        assert!(std::fs::read(&path).unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_capture_failure_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let page = MockPage::new("https://shop.example/");
        page.set_fail_screenshots(true);
        let path = temp.path().join("x.png");
        assert!(capture_to_file(&page, &path, ScreenshotOptions::step(), &Timeouts::immediate())
            .await
            .is_err());
        assert!(!path.exists());
    }
}
