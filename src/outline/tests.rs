use serde_json::{Value, json};

use crate::primitives::{DumpPrimitives, PdfPrimitives};

use super::clean::TextCleaner;
use super::extract::{ContentExtractor, PageSpan, chapter_span};
use super::tree::NodeId;
use super::*;

fn line(text: &str, top: f64) -> Value {
    json!({
        "text": text,
        "bbox": {"x0": 50.0, "top": top, "x1": 500.0, "bottom": top + 12.0}
    })
}

fn page(lines: &[&str]) -> Value {
    let lines = lines
        .iter()
        .enumerate()
        .map(|(index, text)| line(text, 100.0 + 20.0 * index as f64))
        .collect::<Vec<Value>>();
    json!({"text": "", "lines": lines, "tables": []})
}

fn entry(title: &str, page_index: u32) -> Value {
    json!({"title": title, "destination": page_index})
}

fn parent(title: &str, page_index: u32, children: usize) -> Value {
    json!({"title": title, "destination": page_index, "count": children})
}

fn primitives(dump: Value) -> DumpPrimitives {
    DumpPrimitives::from_json("002594_比亚迪_2023.pdf", &dump.to_string())
        .expect("test dump should parse")
}

fn no_running_lines() -> ExtractOptions {
    ExtractOptions {
        strip_running_lines: false,
        ..ExtractOptions::default()
    }
}

fn build(primitives: &DumpPrimitives) -> (OutlineTree, ParseStats) {
    let mut stats = ParseStats::default();
    let items = primitives.outline().expect("dump outline");
    let mut tree = OutlineTree::build(&items, primitives, &mut stats);
    tree.resolve_boundaries(primitives.total_page_count());
    (tree, stats)
}

fn by_section(tree: &OutlineTree, section_id: &str) -> NodeId {
    tree.find_by_section_id(section_id)
        .unwrap_or_else(|| panic!("missing section {section_id}"))
}

#[test]
fn flat_siblings_end_where_the_next_sibling_starts() {
    let primitives = primitives(json!({
        "total_pages": 20,
        "outline": [entry("1 Overview", 4), entry("2 Risks", 9)]
    }));
    let (tree, _) = build(&primitives);

    let overview = by_section(&tree, "1");
    assert_eq!(tree.node(overview).title, "1 Overview");
    assert_eq!(tree.node(overview).page_number, 5);
    assert_eq!(tree.node(overview).next_boundary_page(), Some(10));
    assert_eq!(tree.node(overview).next_title(), Some("2 Risks"));

    let risks = by_section(&tree, "2");
    assert_eq!(tree.node(risks).next_boundary_page(), Some(20));
}

#[test]
fn last_child_escalates_to_parent_sibling() {
    let primitives = primitives(json!({
        "total_pages": 30,
        "outline": [
            parent("1 Overview", 4, 2),
            [entry("1.1", 4), entry("1.2", 5)],
            entry("2 Risks", 9)
        ]
    }));
    let (tree, stats) = build(&primitives);

    assert_eq!(stats.outline_entries, 4);
    let last_child = by_section(&tree, "1.2");
    assert_eq!(tree.node(last_child).page_number, 6);
    assert_eq!(tree.node(last_child).next_boundary_page(), Some(10));
    assert_eq!(tree.node(last_child).next_title(), Some("2 Risks"));
    assert_eq!(tree.node(by_section(&tree, "1.1")).next_boundary_page(), Some(6));
}

#[test]
fn single_page_chapters_are_trimmed_at_both_titles() {
    let primitives = primitives(json!({
        "total_pages": 6,
        "outline": [entry("第一节 概述", 4), entry("第二节 风险", 4)],
        "pages": [
            page(&["封面内容文字"]),
            page(&["目录内容文字"]),
            page(&["释义内容文字"]),
            page(&["提示内容文字"]),
            page(&["页眉说明文字", "第一节 概述", "正文内容甲", "第二节 风险", "正文内容乙"]),
            page(&["第六页内容文字"])
        ]
    }));

    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let document = parsed.document.expect("document");

    assert_eq!(document.outline.len(), 2);
    assert_eq!(document.outline[0].content, "第一节 概述\n正文内容甲");
    assert_eq!(
        document.outline[1].content,
        "第二节 风险\n正文内容乙\n第六页内容文字"
    );

    let first = by_section(&parsed.tree, "1");
    let span = chapter_span(
        parsed.tree.node(first).page_number,
        parsed.tree.node(first).next_boundary_page().expect("resolved"),
        6,
    )
    .expect("span");
    assert_eq!(span, PageSpan { start_page: 4, end_page: 4 });
    assert!(span.is_single_page());
}

#[test]
fn overlapping_table_replaces_its_lines_once() {
    let primitives = primitives(json!({
        "total_pages": 1,
        "outline": [entry("第一节 财务", 0)],
        "pages": [{
            "text": "",
            "lines": [
                line("以上数据经审计", 200.0),
                line("营业收入情况如下", 100.0),
                line("项目 2023", 140.0),
                line("营收 100", 160.0)
            ],
            "tables": [{
                "bbox": {"x0": 40.0, "top": 135.0, "x1": 520.0, "bottom": 185.0},
                "rows": [["项目", "2023"], ["营收", "100"], ["利润", "10"]]
            }]
        }]
    }));

    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let document = parsed.document.expect("document");
    assert_eq!(
        document.outline[0].content,
        "营业收入情况如下\n项目\t2023\n营收\t100\n利润\t10\n以上数据经审计"
    );
    assert_eq!(parsed.stats.table_blocks, 1);

    let leaf = by_section(&parsed.tree, "1");
    let cleaner = TextCleaner::new(4).expect("cleaner");
    let mut extractor = ContentExtractor::new(&primitives, cleaner);
    let mut stats = ParseStats::default();
    for _ in 0..2 {
        let content = extractor.extract(&parsed.tree, leaf, &mut stats);
        assert_eq!(content.matches("项目\t2023").count(), 1);
        assert!(!content.contains("项目 2023"));
    }
    assert_eq!(stats.table_blocks, 1);
}

#[test]
fn orphan_child_list_is_skipped_without_failing() {
    let primitives = primitives(json!({
        "total_pages": 10,
        "outline": [
            entry("一", 0),
            [entry("孤立 1", 1), entry("孤立 2", 2)],
            entry("二", 3)
        ]
    }));
    let (tree, stats) = build(&primitives);

    assert_eq!(stats.orphan_child_lists, 1);
    assert_eq!(stats.warnings.len(), 1);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.node(tree.root()).children().len(), 2);
    assert!(tree.preorder().iter().all(|id| tree.node(*id).is_leaf()));
}

#[test]
fn unresolved_destinations_keep_the_node_with_page_zero() {
    let primitives = primitives(json!({
        "total_pages": 5,
        "named_destinations": {"intro": 0},
        "outline": [
            json!({"title": "封面", "destination": "intro"}),
            json!({"title": "  无   目标  "}),
            json!({"destination": "missing"}),
            entry("越界", 9)
        ]
    }));
    let (tree, stats) = build(&primitives);

    let pages = tree
        .preorder()
        .into_iter()
        .map(|id| (tree.node(id).title.clone(), tree.node(id).page_number))
        .collect::<Vec<_>>();
    assert_eq!(
        pages,
        vec![
            ("封面".to_string(), 1),
            ("无 目标".to_string(), 0),
            ("(untitled)".to_string(), 0),
            ("越界".to_string(), 0),
        ]
    );
    assert_eq!(stats.unresolved_destinations, 3);
}

#[test]
fn malformed_destinations_do_not_fail_the_document() {
    let primitives = primitives(json!({
        "total_pages": 3,
        "outline": [
            entry("第一节", 0),
            {"title": "第二节", "destination": -1},
            {"title": "第三节", "destination": {"page": 2}},
            {"title": "第四节", "destination": 1.5},
            entry("第五节", 2)
        ],
        "pages": [page(&["第一节", "正文内容甲"]), page(&["正文内容乙"]), page(&["第五节", "正文内容丙"])]
    }));
    let (tree, stats) = build(&primitives);

    let pages = tree
        .preorder()
        .into_iter()
        .map(|id| tree.node(id).page_number)
        .collect::<Vec<_>>();
    assert_eq!(pages, vec![1, 0, 0, 0, 3]);
    assert_eq!(stats.unresolved_destinations, 3);
    assert_eq!(tree.node(by_section(&tree, "1")).next_boundary_page(), Some(3));

    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let document = parsed.document.expect("document");
    assert_eq!(document.outline.len(), 5);
    assert_eq!(document.outline[0].content, "正文内容甲\n正文内容乙");
}

#[test]
fn root_and_parents_carry_no_content() {
    let primitives = primitives(json!({
        "total_pages": 3,
        "outline": [parent("第一节", 0, 1), [entry("1.1 小节", 1)], entry("第二节", 2)],
        "pages": [
            page(&["第一节", "引言部分内容"]),
            page(&["1.1 小节", "小节部分内容"]),
            page(&["第二节", "结尾部分内容"])
        ]
    }));

    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let tree = &parsed.tree;

    assert_eq!(tree.section_id(tree.root()), None);
    assert_eq!(tree.node(tree.root()).content(), None);
    assert_eq!(tree.node(by_section(tree, "1")).content(), None);
    assert_eq!(
        tree.node(by_section(tree, "1.1")).content(),
        Some("1.1 小节\n小节部分内容")
    );

    let document = parsed.document.expect("document");
    let ids = document
        .outline
        .iter()
        .map(|record| record.metadata.section_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1.1", "2"]);
    assert_eq!(document.outline[0].metadata.section_path, vec!["第一节"]);
    assert_eq!(document.outline[0].metadata.page, 2);
    assert_eq!(document.pdf_metadata.report_title, "比亚迪2023年年度报告");
    assert_eq!(document.pdf_metadata.file_name, "002594_比亚迪_2023.pdf");
    assert_eq!(parsed.stats.leaf_count, 2);
    assert_eq!(parsed.stats.empty_leaf_count, 0);
}

#[test]
fn resolved_siblings_bound_each_other() {
    let primitives = primitives(json!({
        "total_pages": 40,
        "outline": [
            parent("一", 1, 3),
            [entry("1.1", 1), entry("1.2", 0), entry("1.3", 6)],
            parent("二", 10, 2),
            [entry("2.1", 10), entry("2.2", 14)],
            entry("三", 20)
        ]
    }));
    let (tree, _) = build(&primitives);

    for id in tree.preorder() {
        let Some(parent) = tree.node(id).parent() else {
            continue;
        };
        let siblings = tree.node(parent).children();
        let index = tree.sibling_index(id).expect("indexed");
        if let Some(next) = siblings.get(index + 1) {
            let next_page = tree.node(*next).page_number;
            if next_page > 0 {
                assert_eq!(tree.node(id).next_boundary_page(), Some(next_page));
            }
        }
    }

    assert_eq!(tree.node(by_section(&tree, "1.1")).next_boundary_page(), Some(7));
}

#[test]
fn section_ids_round_trip_and_paths_match_depth() {
    let primitives = primitives(json!({
        "total_pages": 12,
        "outline": [
            parent("A", 0, 2),
            [parent("A.a", 1, 1), [entry("A.a.i", 2)], entry("A.b", 3)],
            entry("B", 5)
        ]
    }));
    let (tree, _) = build(&primitives);

    for id in tree.preorder() {
        let section_id = tree.section_id(id).expect("non-root").to_string();
        assert_eq!(tree.find_by_section_id(&section_id), Some(id));
        assert_eq!(
            Some(tree.section_path(id).len()),
            tree.node(id).level
        );
    }
    assert_eq!(tree.section_path(by_section(&tree, "1.1.1")), vec!["A", "A.a"]);
    assert_eq!(tree.find_by_section_id("3"), None);
    assert_eq!(tree.find_by_section_id("0"), None);
}

#[test]
fn serialized_paths_rebuild_from_section_ids_and_titles() {
    let primitives = primitives(json!({
        "total_pages": 6,
        "outline": [
            parent("A", 0, 2),
            [parent("A.a", 1, 1), [entry("A.a.i", 2)], entry("A.b", 3)],
            entry("B", 5)
        ],
        "pages": [
            page(&["A", "甲部分内容"]),
            page(&["A.a", "乙部分内容"]),
            page(&["A.a.i", "丙部分内容"]),
            page(&["A.b", "丁部分内容"]),
            page(&["丁部分续页"]),
            page(&["B", "戊部分内容"])
        ]
    }));
    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let document = parsed.document.expect("document");

    let encoded = serde_json::to_string(&document).expect("encode");
    let decoded: ReportDocument = serde_json::from_str(&encoded).expect("decode");
    assert_eq!(decoded, document);

    let titles = parsed
        .tree
        .preorder()
        .into_iter()
        .map(|id| {
            (
                parsed.tree.section_id(id).expect("non-root").to_string(),
                parsed.tree.node(id).title.clone(),
            )
        })
        .collect::<std::collections::HashMap<String, String>>();

    let ids = decoded
        .outline
        .iter()
        .map(|record| record.metadata.section_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1.1.1", "1.2", "2"]);

    for record in &decoded.outline {
        let parts = record.metadata.section_id.split('.').collect::<Vec<_>>();
        let rebuilt = (1..parts.len())
            .map(|depth| titles[&parts[..depth].join(".")].clone())
            .collect::<Vec<String>>();
        assert_eq!(rebuilt, record.metadata.section_path);
        assert_eq!(titles[&record.metadata.section_id], record.metadata.section_title);
    }
    assert_eq!(decoded.outline[0].metadata.section_path, vec!["A", "A.a"]);
    assert!(decoded.outline[2].metadata.section_path.is_empty());
}

#[test]
fn chapter_outside_document_gets_empty_content() {
    let primitives = primitives(json!({
        "total_pages": 2,
        "pages": [page(&["第一页内容"]), page(&["第二页内容"])]
    }));
    let mut tree = OutlineTree::new();
    let root = tree.root();
    let beyond = tree.add_child(root, "附录", 99);
    tree.resolve_boundaries(2);

    let mut extractor = ContentExtractor::new(&primitives, TextCleaner::new(4).expect("cleaner"));
    let mut stats = ParseStats::default();
    assert_eq!(extractor.extract(&tree, beyond, &mut stats), "");
    assert_eq!(stats.warnings.len(), 1);
    assert_eq!(chapter_span(0, 5, 10), None);
}

#[test]
fn unreadable_page_is_skipped_and_chapter_keeps_the_rest() {
    let primitives = primitives(json!({
        "total_pages": 3,
        "outline": [entry("第一节 概述", 0)],
        "pages": [page(&["第一节 概述", "第一页正文"]), null, page(&["第三页正文"])]
    }));

    let parsed = parse_document(&primitives, &no_running_lines()).expect("parse");
    let document = parsed.document.expect("document");

    assert_eq!(document.outline[0].content, "第一节 概述\n第一页正文\n第三页正文");
    assert_eq!(parsed.stats.skipped_pages, 1);
}

#[test]
fn running_lines_are_stripped_across_chapters() {
    let primitives = primitives(json!({
        "total_pages": 3,
        "outline": [entry("第一节 概述", 0), entry("第二节 风险", 2)],
        "pages": [
            page(&["比亚迪股份有限公司 年报摘录", "第一节 概述", "第一页正文"]),
            page(&["比亚迪股份有限公司 年报摘录", "第二页正文"]),
            page(&["比亚迪股份有限公司 年报摘录", "第二节 风险", "第三页正文"])
        ]
    }));

    let parsed = parse_document(&primitives, &ExtractOptions::default()).expect("parse");
    let document = parsed.document.expect("document");

    assert_eq!(
        document.outline[0].content,
        "第一节 概述\n第一页正文\n第二页正文"
    );
    assert_eq!(document.outline[1].content, "第二节 风险\n第三页正文");
    assert!(parsed.stats.dropped_lines >= 1);
}

#[test]
fn document_without_outline_yields_nothing() {
    let primitives = primitives(json!({"total_pages": 4}));

    let parsed = parse_document(&primitives, &ExtractOptions::default()).expect("parse");
    assert!(parsed.document.is_none());
    assert!(parsed.tree.is_empty());
    assert_eq!(parsed.stats.warnings, vec!["document has no outline".to_string()]);
}
