use tradeboard::adapters::{resolve_endpoint, PageOrigin};
use tradeboard::domain::{ReportAccumulator, ReportLength, ReportSection};
use tradeboard::protocol::{decode_frame, ClientEnvelope, Decoded, Dispatcher, ServerMessage};
use tradeboard::report::{
    export_body, extract_decision, render_markdown, summarize_report, summarize_section, Block,
    ExportDocument, ExportLayout, ExportMeta, SummaryMode,
};

const LONG_REPORT: &str = "\
MARKET OVERVIEW
- Price broke above the 50 day moving average
- Volume is well above the monthly average
- RSI is approaching overbought territory
- Options skew turned bullish this week

Key risks:
The main risk is a reversal if the broader market trend weakens. Analysts recommend a tight stop below support. Short term momentum remains strong.";

#[test]
fn decision_extraction_is_deterministic() {
    assert_eq!(extract_decision("...we recommend a HOLD position..."), "HOLD");
    assert_eq!(extract_decision("no actionable view yet"), "REVIEW");
    assert_eq!(extract_decision("re-evaluate next quarter"), "RE-EVALUATE");
}

#[test]
fn summary_keeps_three_bullets_per_heading_in_both_modes() {
    let live = summarize_section(LONG_REPORT, SummaryMode::Live);
    let export = summarize_section(LONG_REPORT, SummaryMode::Export);

    assert!(live.starts_with("MARKET OVERVIEW"));
    assert_eq!(live.lines().filter(|l| l.starts_with("• ")).count(), 3);
    assert!(live.contains("\nKey risks\n"));
    // Extraction already yields at most three bullets or two sentences
    assert_eq!(export, live);
}

#[test]
fn export_summary_carries_recommendation() {
    let summary = summarize_report(LONG_REPORT, Some("BUY"));
    assert!(summary.ends_with("\n\nRECOMMENDATION: BUY"));
}

#[test]
fn markdown_is_escaped_before_bold() {
    let blocks = render_markdown("Buy **now** if P/E < 20 & margin > 10%\n\n- **Target**: 250\n- Stop <200");
    assert_eq!(
        blocks,
        vec![
            Block::Paragraph("Buy <strong>now</strong> if P/E &lt; 20 &amp; margin &gt; 10%".into()),
            Block::List(vec![
                "<strong>Target</strong>: 250".into(),
                "Stop &lt;200".into()
            ]),
        ]
    );
}

#[test]
fn export_document_paginates_with_footers() {
    let mut report = ReportAccumulator::new();
    for i in 0..30 {
        report.upsert(ReportSection::new(
            format!("s{i}"),
            format!("Section {i}"),
            "Body line for the export.",
        ));
    }

    let body = export_body(&report.plain_text(), ReportLength::Long, None);
    let meta = ExportMeta {
        ticker: "AAPL".into(),
        analysis_date: "2025-11-25".into(),
        report_length: ReportLength::Long,
    };
    let layout = ExportLayout {
        lines_per_page: 40,
        line_width: 90,
    };
    let doc = ExportDocument::build(&body, meta, layout);
    let text = doc.render_text();

    assert!(doc.page_count() >= 3);
    assert!(text.contains(&format!("Page 1 of {}", doc.page_count())));
    assert!(text.contains(&format!("Page {0} of {0}", doc.page_count())));
    assert!(text.contains("Current Report (Long Format)"));
}

#[test]
fn wire_contract_round_trips_through_dispatcher() {
    assert_eq!(
        ClientEnvelope::StopAnalysis.to_json().unwrap(),
        r#"{"action":"stop_analysis"}"#
    );

    let mut dispatcher = Dispatcher::default();
    match dispatcher.decode(r#"{"type":"pong","data":{},"timestamp":"2025-11-25T10:00:00"}"#) {
        Decoded::Message(ServerMessage::Pong) => {}
        other => panic!("expected pong, got {:?}", other),
    }
    assert!(decode_frame("<html>").is_err());
}

#[test]
fn endpoint_follows_page_origin() {
    let cases = [
        ("https://trade.example.com", "wss://trade.example.com:443/ws"),
        ("http://127.0.0.1:3000", "ws://127.0.0.1:3000/ws"),
        ("file:///tmp/index.html", "ws://localhost:8000/ws"),
    ];
    for (origin, expected) in cases {
        let origin = PageOrigin::parse(origin).unwrap();
        assert_eq!(resolve_endpoint(&origin), expected);
    }
}
