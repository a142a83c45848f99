//! `crodump` — decode a CRO firmware configuration archive and print its records.
//!
//! Exit codes are distinct per fatal error kind so scripting callers can tell malformed input
//! apart from an unsupported format or corrupted ciphertext:
//!
//! | code | condition                                        |
//! |------|--------------------------------------------------|
//! | 0    | decoded (integrity verified or not)              |
//! | 1    | I/O or usage error                               |
//! | 2    | malformed container                              |
//! | 3    | unsupported format version                       |
//! | 4    | key derivation failed                            |
//! | 5    | decryption failed                                |
//! | 6    | truncated record                                 |
//! | 7    | unverified integrity with `--require-verified`   |

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crodump_core::{decode, CroError, DecodeResult, FieldValue};

const EXIT_MALFORMED: u8 = 2;
const EXIT_UNSUPPORTED: u8 = 3;
const EXIT_KEY_DERIVATION: u8 = 4;
const EXIT_DECRYPTION: u8 = 5;
const EXIT_TRUNCATED: u8 = 6;
const EXIT_UNVERIFIED: u8 = 7;

const REDACTED: &str = "<redacted>";

#[derive(Parser, Debug)]
#[command(
    name = "crodump",
    about = "Decode CRO firmware configuration archives",
    version
)]
struct Args {
    /// CRO archive to decode.
    input: PathBuf,

    /// Output rendering.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print credential values instead of redacting them.
    #[arg(long)]
    show_secrets: bool,

    /// Treat a failed integrity check as fatal instead of advisory.
    #[arg(long)]
    require_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn exit_code(err: &CroError) -> u8 {
    match err {
        CroError::MalformedContainer { .. } => EXIT_MALFORMED,
        CroError::UnsupportedFormat { .. } => EXIT_UNSUPPORTED,
        CroError::KeyDerivation { .. } => EXIT_KEY_DERIVATION,
        CroError::DecryptionFailed { .. } => EXIT_DECRYPTION,
        CroError::TruncatedRecord { .. } => EXIT_TRUNCATED,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("crodump: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let result = match decode(&bytes) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("crodump: {err}");
            return Ok(ExitCode::from(exit_code(&err)));
        }
    };

    if !result.provenance.verified {
        eprintln!("crodump: warning: integrity check failed; output may be garbled or wrongly keyed");
        if args.require_verified {
            return Ok(ExitCode::from(EXIT_UNVERIFIED));
        }
    }

    match args.format {
        OutputFormat::Text => print_text(&result, args.show_secrets),
        OutputFormat::Json => print_json(&result, args.show_secrets)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::U32(v) => v.to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        FieldValue::Raw { tag, bytes } => {
            format!("0x{} (raw, tag 0x{tag:02x})", hex::encode(bytes))
        }
    }
}

fn print_text(result: &DecodeResult, show_secrets: bool) {
    for record in &result.records {
        let value = if record.sensitive && !show_secrets {
            REDACTED.to_string()
        } else {
            render_value(&record.value)
        };
        println!("{} = {}", record.name, value);
    }
}

#[derive(Serialize)]
struct JsonProvenance<'a> {
    version: u16,
    descriptor: &'a str,
    verified: bool,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    key_id: u16,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    value: serde_json::Value,
    sensitive: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    provenance: JsonProvenance<'a>,
    records: Vec<JsonRecord<'a>>,
}

fn json_kind(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Text(_) => "text",
        FieldValue::U32(_) => "u32",
        FieldValue::Bytes(_) => "bytes",
        FieldValue::Bool(_) => "bool",
        FieldValue::Raw { .. } => "raw",
    }
}

fn json_value(value: &FieldValue, redact: bool) -> serde_json::Value {
    if redact {
        return serde_json::Value::String(REDACTED.to_string());
    }
    match value {
        FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        FieldValue::U32(v) => serde_json::Value::from(*v),
        FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        FieldValue::Bytes(b) => serde_json::Value::String(hex::encode(b)),
        FieldValue::Raw { bytes, .. } => serde_json::Value::String(hex::encode(bytes)),
    }
}

fn print_json(result: &DecodeResult, show_secrets: bool) -> anyhow::Result<()> {
    let out = JsonOutput {
        provenance: JsonProvenance {
            version: result.provenance.version,
            descriptor: result.provenance.descriptor,
            verified: result.provenance.verified,
        },
        records: result
            .records
            .iter()
            .map(|record| JsonRecord {
                key_id: record.key_id,
                name: &record.name,
                kind: json_kind(&record.value),
                value: json_value(&record.value, record.sensitive && !show_secrets),
                sensitive: record.sensitive,
            })
            .collect(),
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &out).context("serializing JSON output")?;
    writeln!(handle)?;
    Ok(())
}
