use proptest::prelude::*;
use querymend_sql::{correct_sql, needs_correction, Correction, CorrectionInput, CorrectionOptions};

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,10}").unwrap()
}

fn min_max() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("MAX"), Just("MIN"), Just("max"), Just("Min")]
}

fn other_agg() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("SUM"), Just("COUNT"), Just("avg")]
}

fn quoted(name: String, style: u8) -> String {
    match style % 3 {
        0 => name,
        1 => format!("\"{name}\""),
        _ => format!("'{name}'"),
    }
}

/// `SELECT [label,] MAX(col) FROM table [WHERE ...][;]`
fn ungrouped_min_max() -> impl Strategy<Value = (String, String, String)> {
    (
        proptest::option::of(ident()),
        min_max(),
        ident(),
        any::<u8>(),
        ident(),
        any::<u8>(),
        any::<bool>(),
    )
        .prop_map(|(label, func, col, col_style, table, table_style, semi)| {
            let label = label.map(|l| format!("{l}, ")).unwrap_or_default();
            let sql = format!(
                "SELECT {label}{func}({}) FROM {}{}",
                quoted(col.clone(), col_style),
                quoted(table.clone(), table_style),
                if semi { ";" } else { "" }
            );
            (sql, table, col)
        })
}

fn uppercase_has_min_max(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.contains("MAX(") || upper.contains("MIN(")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn ungrouped_min_max_is_rewritten_and_capped((sql, table, col) in ungrouped_min_max()) {
        let options = CorrectionOptions::default();
        let out = correct_sql(CorrectionInput::new(&sql, ""), &options);
        prop_assert!(out.is_rewritten(), "not rewritten: {}", sql);
        prop_assert!(!uppercase_has_min_max(out.sql()));
        prop_assert!(out.sql().ends_with("LIMIT 1000"));
        match out {
            Correction::RewrittenWithColumns { table: t, aggregate_column, sql: rewritten, .. } => {
                prop_assert_eq!(t, table);
                prop_assert_eq!(&aggregate_column, &col);
                let order_by = format!("ORDER BY \"{}\" DESC", col);
                prop_assert!(rewritten.contains(&order_by));
            }
            other => prop_assert!(false, "unexpected branch: {:?}", other),
        }
    }

    #[test]
    fn grouped_queries_are_untouched(label in ident(), func in min_max(), col in ident(), table in ident()) {
        let sql = format!("SELECT {label}, {func}({col}) FROM {table} GROUP BY {label}");
        let out = correct_sql(CorrectionInput::new(&sql, &table), &CorrectionOptions::default());
        prop_assert_eq!(out.sql(), sql.as_str());
    }

    #[test]
    fn queries_without_min_max_are_untouched(label in ident(), func in other_agg(), col in ident(), table in ident()) {
        let sql = format!("SELECT {label}, {func}({col}) FROM {table}");
        prop_assume!(!needs_correction(&sql));
        let out = correct_sql(CorrectionInput::new(&sql, &table), &CorrectionOptions::default());
        prop_assert_eq!(out.sql(), sql.as_str());
    }

    #[test]
    fn correction_reaches_a_fixed_point(
        head in "[ -~]{0,30}",
        func in min_max(),
        tail in "[ -~]{0,40}",
        table in "[ -~]{0,12}",
    ) {
        let sql = format!("{head}{func}({tail}");
        let options = CorrectionOptions::default();
        let once = correct_sql(CorrectionInput::new(&sql, &table), &options);
        let twice = correct_sql(CorrectionInput::new(once.sql(), &table), &options);
        prop_assert_eq!(once.sql(), twice.sql());
    }

    #[test]
    fn row_cap_is_honoured(cap in 1u64..100_000, col in ident(), table in ident()) {
        let options = CorrectionOptions { row_cap: cap, ..CorrectionOptions::default() };
        let sql = format!("SELECT MAX({col}) FROM {table}");
        let out = correct_sql(CorrectionInput::new(&sql, ""), &options);
        let limit = format!("LIMIT {cap}");
        prop_assert!(out.sql().ends_with(&limit));
    }
}

#[test]
fn unresolvable_table_leaves_sql_unchanged() {
    let sql = "SELECT MAX(Assists)";
    let out = correct_sql(CorrectionInput::new(sql, ""), &CorrectionOptions::default());
    assert_eq!(out.sql(), sql);
    assert!(!out.is_rewritten());
}
