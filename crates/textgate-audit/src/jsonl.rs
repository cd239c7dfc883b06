//! JSONL persistence: one audit record per line.
//!
//! The portable interchange format for audit windows. External auditors
//! re-verify a file with nothing but the anchor link and these lines.

use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chain::AuditRecord;
use crate::error::AuditError;

/// Read audit records from a JSONL reader. Blank lines and `#` comment
/// lines are skipped.
pub fn read_records(reader: impl BufRead) -> Result<Vec<AuditRecord>, AuditError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AuditError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(trimmed)
            .map_err(|e| AuditError::Parse(line_no + 1, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

/// Write audit records to a JSONL writer.
pub fn write_records(writer: &mut impl Write, records: &[AuditRecord]) -> Result<(), AuditError> {
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| AuditError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| AuditError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Read audit records from a JSONL file path.
pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| AuditError::Io(0, format!("{}: {e}", path.display())))?;
    read_records(decode_log(path, &bytes)?.as_bytes())
}

/// Write audit records to a JSONL file path, atomically: the content goes
/// to a staging file that replaces the target only after a full fsync.
pub fn write_records_to_path(
    path: impl AsRef<Path>,
    records: &[AuditRecord],
) -> Result<(), AuditError> {
    let staged = StagedWrite::begin(path.as_ref())?;
    match staged.store(records) {
        Ok(()) => staged.commit(),
        Err(error) => {
            staged.abort();
            Err(error)
        }
    }
}

/// An audit log is plain UTF-8 text or it is corrupt. NUL bytes are the
/// classic signature of a torn write, so they get their own message.
fn decode_log<'a>(path: &Path, bytes: &'a [u8]) -> Result<&'a str, AuditError> {
    if bytes.contains(&0) {
        return Err(AuditError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    std::str::from_utf8(bytes).map_err(|_| {
        AuditError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        ))
    })
}

/// A pending replacement of `target`. Content is staged beside it under
/// a process-unique name; nothing touches the target until `commit`.
struct StagedWrite {
    target: PathBuf,
    staging: PathBuf,
}

impl StagedWrite {
    fn begin(target: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = Self::parent_of(target) {
            fs::create_dir_all(parent)
                .map_err(|e| AuditError::Io(0, format!("{}: {e}", parent.display())))?;
        }

        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut staging = target.as_os_str().to_os_string();
        staging.push(format!(".tmp.{}.{unique}", std::process::id()));

        Ok(Self {
            target: target.to_path_buf(),
            staging: PathBuf::from(staging),
        })
    }

    /// Fill the staging file and flush it all the way to disk.
    fn store(&self, records: &[AuditRecord]) -> Result<(), AuditError> {
        let io_err = |e: std::io::Error| AuditError::Io(0, format!("{}: {e}", self.staging.display()));

        let file = File::create(&self.staging).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_records(&mut writer, records)?;
        writer.flush().map_err(io_err)?;
        writer
            .into_inner()
            .map_err(|e| AuditError::Io(0, format!("{}: {e}", self.staging.display())))?
            .sync_all()
            .map_err(io_err)?;
        Ok(())
    }

    /// Swap the staging file into place and sync the directory entry.
    fn commit(self) -> Result<(), AuditError> {
        fs::rename(&self.staging, &self.target).map_err(|e| {
            let _ = fs::remove_file(&self.staging);
            AuditError::Io(
                0,
                format!("{} -> {}: {e}", self.staging.display(), self.target.display()),
            )
        })?;

        if let Some(parent) = Self::parent_of(&self.target) {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| AuditError::Io(0, format!("{}: {e}", parent.display())))?;
        }
        Ok(())
    }

    fn abort(self) {
        let _ = fs::remove_file(&self.staging);
    }

    fn parent_of(path: &Path) -> Option<&Path> {
        path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AuditChain;
    use textgate_kernel::Engine;

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "textgate-audit-{prefix}-{}-{unique}.jsonl",
            std::process::id()
        ))
    }

    fn sample_records(n: usize) -> Vec<AuditRecord> {
        let engine = Engine::with_defaults().unwrap();
        let chain = AuditChain::default();
        for i in 0..n {
            chain.append(&engine.evaluate("q", &format!("answer number {i} for the caller"), None));
        }
        chain.records()
    }

    #[test]
    fn records_round_trip_through_a_file() {
        let path = temp_path("round-trip");
        let records = sample_records(3);
        write_records_to_path(&path, &records).expect("write should succeed");

        let loaded = read_records_from_path(&path).expect("read should succeed");
        assert_eq!(loaded, records);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let records = sample_records(1);
        let line = serde_json::to_string(&records[0]).unwrap();
        let text = format!("# audit log\n\n{line}\n");
        let loaded = read_records(text.as_bytes()).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let text = "{\"sequenceId\":0}\n";
        let err = read_records(text.as_bytes()).unwrap_err();
        match err {
            AuditError::Parse(line, _) => assert_eq!(line, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let path = temp_path("nul");
        fs::write(&path, b"{\"sequenceId\":0}\n\0garbage").expect("fixture should write");

        match read_records_from_path(&path) {
            Err(AuditError::Corrupt(message)) => assert!(message.contains("NUL")),
            other => panic!("expected corrupt log error, got {other:?}"),
        }

        let _ = fs::remove_file(path);
    }

    #[test]
    fn non_utf8_bytes_are_rejected() {
        let path = temp_path("non-utf8");
        fs::write(&path, [0xff, 0xfe, 0xfd]).expect("fixture should write");

        match read_records_from_path(&path) {
            Err(AuditError::Corrupt(message)) => assert!(message.contains("non-UTF-8")),
            other => panic!("expected corrupt log error, got {other:?}"),
        }

        let _ = fs::remove_file(path);
    }

    #[test]
    fn writes_replace_the_file_atomically() {
        let path = temp_path("atomic");
        let records = sample_records(2);
        write_records_to_path(&path, &records[..1]).expect("first write");
        write_records_to_path(&path, &records[1..]).expect("second write");

        let loaded = read_records_from_path(&path).expect("read");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].sequence_id, 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn no_staging_file_survives_a_write() {
        let path = temp_path("staging");
        write_records_to_path(&path, &sample_records(1)).expect("write should succeed");

        let dir = path.parent().expect("temp path has a parent");
        let name = path.file_name().expect("file name").to_string_lossy().into_owned();
        let leftovers: Vec<_> = fs::read_dir(dir)
            .expect("temp dir listing")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(&name) && *n != name)
            .collect();
        assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");

        let _ = fs::remove_file(path);
    }
}
