use crate::model::SubmoduleRecord;

/// Parses the INI-like `.gitmodules` format.
///
/// Each `[submodule "name"]` header starts a record; `path` and `url` keys
/// inside the section fill it in. Unknown keys and other section types are
/// ignored.
pub fn parse_gitmodules(content: &str) -> Vec<SubmoduleRecord> {
    let mut submodules = Vec::new();
    let mut current: Option<SubmoduleRecord> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(done) = current.take() {
                submodules.push(done);
            }
            if let Some(name) = submodule_header(line) {
                current = Some(SubmoduleRecord {
                    name,
                    ..Default::default()
                });
            }
            continue;
        }

        let (Some(record), Some((key, value))) = (current.as_mut(), line.split_once('=')) else {
            continue;
        };

        match key.trim() {
            "path" => record.path = Some(value.trim().to_string()),
            "url" => record.url = value.trim().to_string(),
            _ => {}
        }
    }

    if let Some(done) = current {
        submodules.push(done);
    }

    submodules
}

fn submodule_header(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let rest = inner.strip_prefix("submodule")?.trim();
    Some(rest.trim_matches('"').to_string())
}
