use serde_json::json;
use textgate_audit::{
    ExportFilter, read_records_from_path, verify_window, write_records_to_path,
};

use crate::support::{parse_action_or_exit, print_json_pretty};

/// Exit code when a chain fails to verify.
const EXIT_INVALID: i32 = 1;

pub fn run_verify(records_path: String, anchor: String, expected: Option<String>, json_output: bool) {
    let records = read_records_from_path(&records_path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let report = verify_window(&anchor, &records, expected.as_deref());

    if json_output {
        let payload = json!({
            "recordsPath": records_path,
            "anchor": anchor,
            "report": report,
        });
        print_json_pretty(&payload);
    } else {
        println!("textgate audit verify");
        println!("  Source: {records_path}");
        println!("  Records: {}", report.records_checked);
        if let (Some(first), Some(last)) = (report.first_sequence, report.last_sequence) {
            println!("  Window: sequence {first}..={last}");
        }
        println!("  Computed tail: {}", report.computed_tail);
        if let Some(expected) = &report.expected_tail {
            println!("  Expected tail: {expected}");
        }
        if let Some(mismatch) = &report.mismatch {
            println!(
                "  Mismatch at sequence {}: expected {}, computed {}",
                mismatch.sequence_id, mismatch.expected, mismatch.computed
            );
        }
        println!("  Valid: {}", if report.valid { "yes" } else { "no" });
    }

    if !report.valid {
        std::process::exit(EXIT_INVALID);
    }
}

pub struct ExportArgs {
    pub records: String,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub action: Option<String>,
    pub out: Option<String>,
    pub json: bool,
}

pub fn run_export(args: ExportArgs) {
    let records = read_records_from_path(&args.records).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let filter = ExportFilter {
        from: args.from,
        to: args.to,
        action: args.action.as_deref().map(parse_action_or_exit),
    };
    let selected: Vec<_> = records.into_iter().filter(|r| filter.accepts(r)).collect();

    if let Some(out) = &args.out {
        write_records_to_path(out, &selected).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        });
        if args.json {
            print_json_pretty(&json!({
                "out": out,
                "recordCount": selected.len(),
            }));
        } else {
            println!("textgate audit export");
            println!("  Wrote {} record(s) to {out}", selected.len());
        }
        return;
    }

    if args.json {
        print_json_pretty(&json!({
            "recordCount": selected.len(),
            "records": selected,
        }));
    } else {
        for record in &selected {
            println!(
                "{}",
                serde_json::to_string(record).expect("json serialization")
            );
        }
    }
}