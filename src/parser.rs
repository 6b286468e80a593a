//! Narrative insight parser.
//!
//! Splits a markdown-ish insight document into four buckets by its `## `
//! headings so the UI can disclose them progressively. Applied once per raw
//! document; its output is never fed back in.

use serde::Serialize;

/// The four canonical buckets of an insight document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsightSections {
    pub insights: String,
    pub root: String,
    pub recs: String,
    pub actions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightBucket {
    Insights,
    Root,
    Recs,
    Actions,
}

impl InsightSections {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
            && self.root.is_empty()
            && self.recs.is_empty()
            && self.actions.is_empty()
    }

    pub fn bucket(&self, bucket: InsightBucket) -> &str {
        match bucket {
            InsightBucket::Insights => &self.insights,
            InsightBucket::Root => &self.root,
            InsightBucket::Recs => &self.recs,
            InsightBucket::Actions => &self.actions,
        }
    }

    fn bucket_mut(&mut self, bucket: InsightBucket) -> &mut String {
        match bucket {
            InsightBucket::Insights => &mut self.insights,
            InsightBucket::Root => &mut self.root,
            InsightBucket::Recs => &mut self.recs,
            InsightBucket::Actions => &mut self.actions,
        }
    }

    /// Append a block, separated from earlier blocks by a blank line.
    fn push_block(&mut self, bucket: InsightBucket, block: &str) {
        let target = self.bucket_mut(bucket);
        if !target.is_empty() {
            target.push_str("\n\n");
        }
        target.push_str(block);
    }
}

/// A level-2 heading: its title and the byte offset where its line starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading<'a> {
    pub title: &'a str,
    pub start: usize,
}

/// Single pass over the lines, collecting `## ` headings in document order.
///
/// Exactly two `#` then a space and a non-empty title; `### `, `#` and bare
/// `## ` lines are body text.
pub fn scan_level2_headings(text: &str) -> Vec<Heading<'_>> {
    let mut headings = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(title) = line.strip_prefix("## ").map(str::trim) {
            if !title.is_empty() {
                headings.push(Heading {
                    title,
                    start: offset,
                });
            }
        }
        offset += line.len();
    }
    headings
}

/// Pick a bucket from a heading title. Order matters: "root cause" beats
/// "priority", which beats "recommend".
pub fn classify_heading(title: &str) -> InsightBucket {
    let title = title.to_lowercase();
    if title.contains("root cause") {
        InsightBucket::Root
    } else if title.contains("priority action")
        || title.contains("action item")
        || title.contains("priority")
    {
        InsightBucket::Actions
    } else if title.contains("recommend") {
        InsightBucket::Recs
    } else {
        InsightBucket::Insights
    }
}

/// Turn the section's leading `## ` into `### `. Later lines are untouched.
fn demote_heading(section: &str) -> String {
    match section.strip_prefix("## ") {
        Some(rest) => format!("### {}", rest),
        None => section.to_string(),
    }
}

/// Partition an insight document into its four buckets.
///
/// Text with no `## ` headings lands in `insights` unchanged. Text before the
/// first heading also goes to `insights`, ahead of any headed sections.
pub fn parse_insight_sections(text: &str) -> InsightSections {
    let mut sections = InsightSections::default();
    let text = text.trim();
    if text.is_empty() {
        return sections;
    }

    let headings = scan_level2_headings(text);
    if headings.is_empty() {
        sections.insights = text.to_string();
        return sections;
    }

    let preamble = text[..headings[0].start].trim();
    if !preamble.is_empty() {
        sections.push_block(InsightBucket::Insights, preamble);
    }

    for (i, heading) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(text.len());
        let block = demote_heading(text[heading.start..end].trim_end());
        sections.push_block(classify_heading(heading.title), &block);
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(parse_insight_sections("").is_empty());
        assert!(parse_insight_sections("  \n\t \n").is_empty());
    }

    #[test]
    fn test_unheaded_text_goes_to_insights() {
        let parsed = parse_insight_sections("plain text, no headings");
        assert_eq!(
            parsed,
            InsightSections {
                insights: "plain text, no headings".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_only_level3_headings_is_unheaded() {
        let text = "### Detail\nbody\n# Title";
        let parsed = parse_insight_sections(text);
        assert_eq!(parsed.insights, text);
        assert!(parsed.root.is_empty());
    }

    #[test]
    fn test_bare_heading_marker_is_body_text() {
        assert!(scan_level2_headings("## \nbody\n##\n").is_empty());

        let parsed = parse_insight_sections("## Root Cause\nA\n## \nstill root");
        assert_eq!(parsed.root, "### Root Cause\nA\n## \nstill root");
        assert!(parsed.insights.is_empty());
    }

    #[test]
    fn test_classification_precedence() {
        let parsed = parse_insight_sections(
            "## Root Cause Signals\nA\n## Priority Action Items\nB\n## Recommendations\nC\n## Something Else\nD",
        );
        assert_eq!(parsed.root, "### Root Cause Signals\nA");
        assert_eq!(parsed.actions, "### Priority Action Items\nB");
        assert_eq!(parsed.recs, "### Recommendations\nC");
        assert_eq!(parsed.insights, "### Something Else\nD");
    }

    #[test]
    fn test_classify_heading_keywords() {
        assert_eq!(classify_heading("ROOT CAUSE and priority"), InsightBucket::Root);
        assert_eq!(classify_heading("Priority Recommendations"), InsightBucket::Actions);
        assert_eq!(classify_heading("Open action items"), InsightBucket::Actions);
        assert_eq!(classify_heading("Key Recommendations (next quarter)"), InsightBucket::Recs);
        assert_eq!(classify_heading("Areas of Concern"), InsightBucket::Insights);
        assert_eq!(classify_heading(""), InsightBucket::Insights);
    }

    #[test]
    fn test_demotion_only_touches_first_line() {
        let parsed = parse_insight_sections("## Key Findings\nintro\n  ## indented stays\n### sub\nend");
        assert_eq!(
            parsed.insights,
            "### Key Findings\nintro\n  ## indented stays\n### sub\nend"
        );
    }

    #[test]
    fn test_same_bucket_sections_joined_in_order() {
        let parsed = parse_insight_sections(
            "## Key Findings\n- one\n\n## Recommendations\n- rec\n\n## Areas of Concern\n- two\n",
        );
        assert_eq!(
            parsed.insights,
            "### Key Findings\n- one\n\n### Areas of Concern\n- two"
        );
        assert_eq!(parsed.recs, "### Recommendations\n- rec");
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_preamble_kept_ahead_of_insight_sections() {
        let parsed = parse_insight_sections("Summary line.\n\n## Strengths\n- good\n## Root Cause\n- why");
        assert_eq!(parsed.insights, "Summary line.\n\n### Strengths\n- good");
        assert_eq!(parsed.root, "### Root Cause\n- why");
    }

    #[test]
    fn test_crlf_headings() {
        let parsed = parse_insight_sections("## Recommendations\r\n- a\r\n## Action Items\r\n- b");
        assert_eq!(parsed.recs, "### Recommendations\r\n- a");
        assert_eq!(parsed.actions, "### Action Items\r\n- b");
    }

    #[test]
    fn test_scan_offsets() {
        let text = "## A\nx\n## B\n";
        let headings = scan_level2_headings(text);
        assert_eq!(
            headings,
            vec![
                Heading { title: "A", start: 0 },
                Heading { title: "B", start: 7 },
            ]
        );
        assert!(text[headings[1].start..].starts_with("## B"));
    }

    #[test]
    fn test_every_body_line_lands_in_exactly_one_bucket() {
        let text = "\
Intro paragraph.

## Key Findings
- Total blocks analyzed: **14**
- Average dropout rate: **2.31%**

## High Risk Blocks (Top 5)
- **Junnar**: risk score **71.2**

## Root Cause Signals (data-driven)
- **High migration share** often indicates seasonal movement.

## Recommendations (no LLM)
- **Targeted outreach** in top-risk blocks.

## Priority Action Items (next 30 days)
- **Week 1**: publish top-10 at-risk schools.
";
        let parsed = parse_insight_sections(text);
        let buckets = [&parsed.insights, &parsed.root, &parsed.recs, &parsed.actions];

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let expected = line.strip_prefix("## ").map(|t| format!("### {}", t));
            let needle = expected.as_deref().unwrap_or(line);
            let hits: usize = buckets.iter().map(|b| b.matches(needle).count()).sum();
            assert_eq!(hits, 1, "line {:?} found {} times", line, hits);
        }

        assert!(parsed.insights.starts_with("Intro paragraph.\n\n### Key Findings"));
        assert!(parsed.insights.contains("### High Risk Blocks (Top 5)"));
        assert!(parsed.root.starts_with("### Root Cause Signals"));
        assert!(parsed.recs.starts_with("### Recommendations (no LLM)"));
        assert!(parsed.actions.starts_with("### Priority Action Items"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "## Strengths\n- a\n## Areas of Concern\n- b\n## Key Recommendations\n- c";
        assert_eq!(parse_insight_sections(text), parse_insight_sections(text));
    }
}
