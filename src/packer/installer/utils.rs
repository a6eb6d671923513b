//! Installer script utility functions.

use crate::packer::error::{ErrorExt, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Quote a value for an Inno Setup string parameter.
///
/// Inno Setup escapes a double quote inside a quoted string by doubling it.
pub fn quote(value: &str) -> String {
    value.replace('"', "\"\"")
}

/// Write file with UTF-8 BOM.
///
/// The installer compiler reads scripts without a BOM in the legacy ANSI code
/// page. This function writes the BOM (EF BB BF) followed by the content.
pub async fn write_utf8_bom(path: &Path, content: &str) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .fs_context("creating installer script", path)?;

    file.write_all(&[0xEF, 0xBB, 0xBF])
        .await
        .fs_context("writing UTF-8 BOM", path)?;
    file.write_all(content.as_bytes())
        .await
        .fs_context("writing installer script", path)?;
    file.flush()
        .await
        .fs_context("flushing installer script", path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_quotes() {
        assert_eq!(quote(r#"C:\My "App"\x.rb"#), r#"C:\My ""App""\x.rb"#);
        assert_eq!(quote("plain"), "plain");
    }

    #[tokio::test]
    async fn test_write_utf8_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.iss");
        write_utf8_bom(&path, "[Setup]\n").await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&bytes[3..], b"[Setup]\n");
    }
}
