use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

/// Writes `contents` to `path`, or to stdout when no path is given.
///
/// An existing file is only replaced with `force`.
pub fn write_output(path: Option<&str>, contents: &str, force: bool) -> anyhow::Result<()> {
    let Some(path) = path else {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(contents.as_bytes())
            .context("write stdout")?;
        if !contents.ends_with('\n') {
            stdout.write_all(b"\n").context("write stdout newline")?;
        }
        stdout.flush().context("flush stdout")?;
        return Ok(());
    };

    let out = Path::new(path);
    if out.exists() && !force {
        anyhow::bail!("output already exists: {path}");
    }
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options
        .open(out)
        .with_context(|| format!("open output: {path}"))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write output: {path}"))?;
    file.flush()
        .with_context(|| format!("flush output: {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite_without_force() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("nested").join("out.html");
        let path_str = path.to_string_lossy().to_string();

        write_output(Some(&path_str), "first", false)?;
        let err = write_output(Some(&path_str), "second", false).unwrap_err();
        assert!(err.to_string().contains("output already exists"));
        assert_eq!(std::fs::read_to_string(&path)?, "first");

        write_output(Some(&path_str), "second", true)?;
        assert_eq!(std::fs::read_to_string(&path)?, "second");
        Ok(())
    }
}
