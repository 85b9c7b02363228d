use std::collections::BTreeMap;

/// Parsed `<sha256>  <filename>` checksum listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, String>,
}

impl ChecksumManifest {
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in raw.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }
            let digest = fields[0].to_ascii_lowercase();
            // sha256sum marks binary-mode entries with a leading '*'.
            let name = fields[fields.len() - 1].trim_start_matches('*');
            if digest.len() < 32 || name.is_empty() {
                continue;
            }
            entries.insert(name.to_string(), digest);
        }
        Self { entries }
    }

    pub fn digest_for(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
