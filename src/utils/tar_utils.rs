use std::io;

use tar::{Builder, Header};

/// Builds an in-memory tar archive holding a single file. The entry sits at
/// the archive root; the upload destination decides the directory.
pub fn archive_single_file(file_name: &str, contents: &[u8]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    let mut header = Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, file_name, contents)?;
    builder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn archive_contains_the_entry_under_its_name() {
        let bytes = archive_single_file("main.py", b"print('hi')").unwrap();

        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("main.py"));

        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "print('hi')");
        assert!(entries.next().is_none());
    }
}
