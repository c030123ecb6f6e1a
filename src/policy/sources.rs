use config::{Environment, File, FileFormat, Map, Source, Value, ValueKind};
use std::env;
use std::path::{Path, PathBuf};

use super::models::PolicyValue;
use super::{Policy, PolicyError, TextEncoding};

const POLICY_ENV_VAR: &str = "PASSKIT_POLICY";
const DEFAULT_POLICY_PATH: &str = "config/passkit.ini";
const ENV_PREFIX: &str = "PASSKIT";
const ENV_SEPARATOR: &str = "__";

/// Section holding the policy in INI/TOML text
pub const SECTION: &str = "passlib";

pub type Entries = Vec<(String, PolicyValue)>;

/// Load the policy with priority (highest last):
/// 1. Policy file (`PASSKIT_POLICY`, default `config/passkit.ini`), if present
/// 2. Variables from a .env file (via dotenvy)
/// 3. `PASSKIT__PASSLIB__<KEY>` environment variables
pub fn load() -> Result<Policy, PolicyError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let path = env::var(POLICY_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_POLICY_PATH));

    let base = if path.exists() {
        tracing::info!("Loading policy from: {}", path.display());
        Policy::from_entries(read_path(&path, TextEncoding::Utf8)?)?
    } else {
        tracing::warn!(
            "Policy file not found at {}, using environment overrides only",
            path.display()
        );
        Policy::default()
    };

    let overrides = Policy::from_entries(from_env()?)?;
    base.overlay(&overrides)
}

/// `PASSKIT__PASSLIB__ALL__VARY_ROUNDS=0.1` -> `all.vary_rounds`
pub fn from_env() -> Result<Entries, PolicyError> {
    let table = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .collect()?;
    let mut nested = Map::new();
    for (key, value) in table {
        // the environment source yields flat dotted keys
        insert_path(&mut nested, &key, value);
    }
    section_entries(nested, false)
}

fn insert_path(table: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let child = table
                .entry(head.to_string())
                .or_insert_with(|| Value::new(None, ValueKind::Table(Map::new())));
            if let ValueKind::Table(inner) = &mut child.kind {
                insert_path(inner, rest, value);
            }
        }
        None => {
            table.insert(path.to_string(), value);
        }
    }
}

/// Read a policy file; `.toml` files are TOML, anything else INI
pub fn read_path(path: &Path, encoding: TextEncoding) -> Result<Entries, PolicyError> {
    let data = std::fs::read(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(&data, encoding)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => parse_text(&text, FileFormat::Toml),
        _ => parse_text(&text, FileFormat::Ini),
    }
}

/// Decode raw policy bytes, dropping a byte order mark
pub fn decode_text(data: &[u8], encoding: TextEncoding) -> Result<String, PolicyError> {
    match encoding {
        TextEncoding::Utf8 => {
            let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
            String::from_utf8(data.to_vec()).map_err(|err| PolicyError::Encoding(err.to_string()))
        }
        TextEncoding::Utf16 => {
            let (data, big_endian) = match data {
                [0xfe, 0xff, rest @ ..] => (rest, true),
                [0xff, 0xfe, rest @ ..] => (rest, false),
                _ => (data, false),
            };
            if data.len() % 2 != 0 {
                return Err(PolicyError::Encoding("odd number of bytes in UTF-16 text".to_string()));
            }
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if big_endian {
                        u16::from_be_bytes(pair)
                    } else {
                        u16::from_le_bytes(pair)
                    }
                })
                .collect();
            String::from_utf16(&units).map_err(|err| PolicyError::Encoding(err.to_string()))
        }
    }
}

/// Parse policy text holding a single `[passlib]` section
pub fn parse_text(text: &str, format: FileFormat) -> Result<Entries, PolicyError> {
    let table = config::Config::builder()
        .add_source(File::from_str(text, format))
        .build()?
        .collect()?;
    section_entries(table, format == FileFormat::Ini)
}

fn section_entries(table: Map<String, Value>, ini: bool) -> Result<Entries, PolicyError> {
    let mut entries = Vec::new();
    for (name, value) in table {
        if name != SECTION {
            return Err(PolicyError::UnknownSection(name));
        }
        let ValueKind::Table(section) = value.kind else {
            return Err(PolicyError::UnknownSection(name));
        };
        flatten(String::new(), section, ini, &mut entries)?;
    }
    Ok(entries)
}

/// Nested tables become dotted keys (`[passlib.all] vary_rounds` -> `all.vary_rounds`)
fn flatten(
    prefix: String,
    table: Map<String, Value>,
    ini: bool,
    entries: &mut Entries,
) -> Result<(), PolicyError> {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value.kind {
            ValueKind::Table(inner) => flatten(key, inner, ini, entries)?,
            kind => {
                let value = convert(&key, kind)?;
                entries.push((key, if ini { unescape_ini(value) } else { value }));
            }
        }
    }
    Ok(())
}

fn convert(key: &str, kind: ValueKind) -> Result<PolicyValue, PolicyError> {
    let invalid = |value: String, reason: &str| PolicyError::InvalidValue {
        key: key.to_string(),
        value,
        reason: reason.to_string(),
    };

    Ok(match kind {
        ValueKind::Boolean(b) => PolicyValue::Bool(b),
        ValueKind::I64(n) => PolicyValue::Int(n),
        ValueKind::U64(n) => PolicyValue::Int(
            i64::try_from(n).map_err(|_| invalid(n.to_string(), "integer too large"))?,
        ),
        ValueKind::Float(x) => PolicyValue::Float(x),
        ValueKind::String(text) => PolicyValue::Text(text),
        ValueKind::Array(items) => PolicyValue::List(
            items
                .into_iter()
                .map(Value::into_string)
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(invalid(format!("{other:?}"), "unsupported value type")),
    })
}

/// INI text escapes `%` as `%%`
fn unescape_ini(value: PolicyValue) -> PolicyValue {
    match value {
        PolicyValue::Text(text) => PolicyValue::Text(text.replace("%%", "%")),
        other => other,
    }
}

/// Render entries as INI text under `[passlib]`
pub fn render_ini(entries: &Entries) -> String {
    let mut out = format!("[{SECTION}]\n");
    for (key, value) in entries {
        out.push_str(&format!("{key} = {}\n", value.to_string().replace('%', "%%")));
    }
    out
}

/// Render entries as TOML text under `[passlib]`
pub fn render_toml(entries: &Entries) -> Result<String, PolicyError> {
    let section: toml::Table = entries
        .iter()
        .map(|(key, value)| Ok((key.clone(), toml::Value::try_from(value)?)))
        .collect::<Result<_, toml::ser::Error>>()?;
    let mut root = toml::Table::new();
    root.insert(SECTION.to_string(), toml::Value::Table(section));
    Ok(toml::to_string(&root)?)
}
