use crate::canvas::{Canvas, RenderedDocument};
use crate::chrome::{Footer, Legend, PageHeader};
use crate::debug::DebugLogger;
use crate::item_row::{ItemPiece, ItemRow, TrailingGap, row_height, wrap_item_note};
use crate::primitives::{LayoutEnv, Primitive, SectionHeader};
use crate::types::Pt;
use crate::wrap::Line;
use relmenu_document::{Document, Item};
use serde_json::json;
use std::collections::VecDeque;

/// An item still waiting to be drawn: either untouched or the remainder of a
/// split.
struct PendingItem<'d> {
    item: &'d Item,
    lines: Vec<Line>,
    continued: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Whole,
    /// Draw the first `k` note lines here and carry the rest over.
    Split(usize),
    Defer,
}

pub struct LayoutOutcome {
    pub document: RenderedDocument,
    pub items_placed: usize,
    pub splits: usize,
    pub skipped: Vec<String>,
}

/// State of the page being filled.
struct PageContext {
    canvas: Canvas,
    cursor: Pt,
    /// Section whose header is on this page, if that section is still being laid out.
    stamped_section: Option<usize>,
    placed_on_page: usize,
}

struct Paginator<'a, 'd> {
    env: LayoutEnv<'a>,
    document: &'d Document,
    page: PageContext,
    debug: Option<&'a DebugLogger>,
    items_placed: usize,
    splits: usize,
    skipped: Vec<String>,
}

/// Lays the document out page by page, then draws one footer per page once the
/// page count is known.
pub fn layout_document(
    document: &Document,
    env: LayoutEnv<'_>,
    debug: Option<&DebugLogger>,
) -> LayoutOutcome {
    let mut paginator = Paginator {
        env,
        document,
        page: PageContext {
            canvas: Canvas::new(env.config.page_size),
            cursor: Pt::ZERO,
            stamped_section: None,
            placed_on_page: 0,
        },
        debug,
        items_placed: 0,
        splits: 0,
        skipped: Vec::new(),
    };
    paginator.start_page();
    for (index, _) in document.sections.iter().enumerate() {
        paginator.layout_section(index);
    }
    paginator.finish()
}

impl<'a, 'd> Paginator<'a, 'd> {
    fn content_max_y(&self) -> Pt {
        self.env.config.content_max_y()
    }

    fn start_page(&mut self) {
        let env = self.env;
        let page_number = self.page.canvas.page_number();
        let top = env.config.margins.top;
        PageHeader {
            document: self.document,
            page_number,
        }
        .draw(&mut self.page.canvas, &env, top);
        Legend.draw(&mut self.page.canvas, &env, env.config.legend_top(page_number));
        self.page.cursor = env.config.body_top(page_number);
        self.page.stamped_section = None;
        self.page.placed_on_page = 0;
    }

    fn break_page(&mut self, reason: &str, item: &Item) {
        let from_page = self.page.canvas.page_number();
        log::debug!("page break after page {from_page}: {reason} ({:?})", item.name);
        if let Some(logger) = self.debug {
            logger.event(
                "layout.page_break",
                json!({
                    "from_page": from_page,
                    "to_page": from_page + 1,
                    "reason": reason,
                    "item": item.name,
                    "cursor": self.page.cursor.to_f32(),
                }),
            );
        }
        self.page.canvas.show_page();
        self.start_page();
    }

    fn skip(&mut self, section: usize, pending: PendingItem<'d>, reason: &str) {
        let page = self.page.canvas.page_number();
        let message = format!(
            "item {:?} in section {} skipped on page {page}: {reason}",
            pending.item.name, section
        );
        log::warn!("{message}");
        if let Some(logger) = self.debug {
            logger.event(
                "layout.item_skipped",
                json!({
                    "section": section,
                    "item": pending.item.name,
                    "page": page,
                    "note_lines": pending.lines.len(),
                    "reason": reason,
                }),
            );
        }
        self.skipped.push(message);
    }

    fn plan(&self, head: &PendingItem<'_>, space: Pt) -> Plan {
        let config = self.env.config;
        let total = head.lines.len();
        if row_height(config, total) <= space {
            return Plan::Whole;
        }
        if total == 0 || config.item_line_height > space || space <= config.min_split_space {
            return Plan::Defer;
        }
        let k = (space - config.item_line_height - config.note_gap).whole_steps(config.note_line_height);
        if k >= total {
            Plan::Whole
        } else if k >= 1 {
            Plan::Split(k)
        } else {
            Plan::Defer
        }
    }

    fn content_follows(&self, section: usize) -> bool {
        self.document.sections[section + 1..]
            .iter()
            .any(|later| !later.items.is_empty())
    }

    fn layout_section(&mut self, index: usize) {
        let env = self.env;
        let document = self.document;
        let section = &document.sections[index];
        let mut pending: VecDeque<PendingItem<'d>> = section
            .items
            .iter()
            .map(|item| PendingItem {
                item,
                lines: wrap_item_note(item, &env),
                continued: false,
            })
            .collect();
        let header = SectionHeader {
            title: &section.name,
            followed_by_content: true,
        };
        let header_height = header.measure(&env);

        // Nothing placed on the page yet means a new page cannot help, so a
        // head that does not fit there is skipped instead of deferred again.
        while let Some(head) = pending.front() {
            let fresh = self.page.placed_on_page == 0;
            let stamped = self.page.stamped_section == Some(index);
            let header_cost = if stamped { Pt::ZERO } else { header_height };
            if !stamped && self.page.cursor + header_height > self.content_max_y() {
                if fresh {
                    if let Some(head) = pending.pop_front() {
                        self.skip(index, head, "section header does not fit an empty page");
                    }
                } else {
                    let item = head.item;
                    self.break_page("section header does not fit", item);
                }
                continue;
            }

            let space = self.content_max_y() - self.page.cursor - header_cost;
            let plan = self.plan(head, space);
            if plan == Plan::Defer {
                if fresh {
                    if let Some(head) = pending.pop_front() {
                        self.skip(index, head, "item does not fit an empty page");
                    }
                } else {
                    let item = head.item;
                    self.break_page("item does not fit", item);
                }
                continue;
            }

            if !stamped {
                let cursor = self.page.cursor;
                self.page.cursor += header.draw(&mut self.page.canvas, &env, cursor);
                self.page.stamped_section = Some(index);
            }

            let Some(head) = pending.pop_front() else {
                break;
            };
            match plan {
                Plan::Split(k) => {
                    let piece = if head.continued {
                        ItemPiece::Middle
                    } else {
                        ItemPiece::Start
                    };
                    self.place(&head, &head.lines[..k], piece, TrailingGap::None);
                    self.splits += 1;
                    let page = self.page.canvas.page_number();
                    log::debug!(
                        "split {:?} on page {page}: {k} of {} note lines",
                        head.item.name,
                        head.lines.len()
                    );
                    if let Some(logger) = self.debug {
                        logger.event(
                            "layout.item_split",
                            json!({
                                "section": index,
                                "item": head.item.name,
                                "page": page,
                                "lines_here": k,
                                "lines_remaining": head.lines.len() - k,
                            }),
                        );
                    }
                    let item = head.item;
                    let rest = PendingItem {
                        item,
                        lines: head.lines[k..].to_vec(),
                        continued: true,
                    };
                    pending.push_front(rest);
                    self.break_page("note continues", item);
                }
                Plan::Whole | Plan::Defer => {
                    let piece = if head.continued {
                        ItemPiece::End
                    } else {
                        ItemPiece::Whole
                    };
                    let wanted = if !pending.is_empty() {
                        TrailingGap::Item
                    } else if self.content_follows(index) {
                        TrailingGap::SectionEnd
                    } else {
                        TrailingGap::None
                    };
                    let bottom = self.page.cursor
                        + row_height(env.config, head.lines.len())
                        + wanted.height(env.config);
                    let gap = if bottom > self.content_max_y() {
                        TrailingGap::None
                    } else {
                        wanted
                    };
                    self.place(&head, &head.lines, piece, gap);
                    self.items_placed += 1;
                }
            }
        }
    }

    fn place(&mut self, head: &PendingItem<'_>, lines: &[Line], piece: ItemPiece, gap: TrailingGap) {
        let env = self.env;
        let row = ItemRow::new(head.item, lines, piece, gap);
        let cursor = self.page.cursor;
        self.page.cursor += row.draw(&mut self.page.canvas, &env, cursor);
        self.page.placed_on_page += 1;
    }

    fn finish(mut self) -> LayoutOutcome {
        let env = self.env;
        if self.page.placed_on_page == 0 && self.page.canvas.page_number() > 1 {
            log::debug!("dropping trailing page without content");
            self.page.canvas.discard_current_page();
        } else {
            self.page.canvas.show_page();
        }
        let mut rendered = self.page.canvas.finish_without_show();

        let page_count = rendered.pages.len();
        let mut overlay = Canvas::new(env.config.page_size);
        for page_number in 1..=page_count {
            Footer {
                page_number,
                page_count,
                timestamp: self.document.timestamp,
            }
            .draw(&mut overlay, &env, env.config.footer_top());
            overlay.show_page();
        }
        rendered.merge_overlay(overlay.finish_without_show());

        LayoutOutcome {
            document: rendered,
            items_placed: self.items_placed,
            splits: self.splits,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Page};
    use crate::chrome::FOOTER_META_KEY;
    use crate::debug::tests::{read_events, temp_log_path};
    use crate::font::DESCENT;
    use crate::item_row::ITEM_META_KEY;
    use crate::primitives::tests::Fixture;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use relmenu_document::{Note, Section, Status};

    fn document(sections: Vec<Section>) -> Document {
        Document {
            timestamp: 1_700_000_000_000,
            participants: vec!["Alex".to_string(), "Sam".to_string()],
            language: "en".to_string(),
            sections,
        }
    }

    fn item_metas(page: &Page) -> Vec<(String, usize, String)> {
        page.meta_values(ITEM_META_KEY)
            .map(|value| {
                let mut parts = value.splitn(3, ':');
                let piece = parts.next().unwrap_or_default().to_string();
                let lines = parts.next().unwrap_or_default().parse().unwrap_or(0);
                let name = parts.next().unwrap_or_default().to_string();
                (piece, lines, name)
            })
            .collect()
    }

    fn count_text(page: &Page, needle: &str) -> usize {
        page.texts().filter(|text| *text == needle).count()
    }

    /// Body commands are everything before the footer overlay, which starts after
    /// the closing RestoreState of the isolated base commands.
    fn body_commands(page: &Page) -> &[Command] {
        let end = page
            .commands
            .iter()
            .rposition(|cmd| matches!(cmd, Command::RestoreState))
            .unwrap_or(page.commands.len());
        &page.commands[..end]
    }

    fn numbered_note(lines: usize) -> Note {
        Note::plain(
            (1..=lines)
                .map(|n| format!("line {n}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    #[test]
    fn scenario_single_section_fits_one_page() {
        let fixture = Fixture::new();
        let doc = document(vec![Section::new(
            "Touch",
            vec![
                Item::new("Hugs", Status::Must),
                Item::new("Kissing", Status::Like),
                Item::new("Tickling", Status::OffLimit),
            ],
        )]);
        let outcome = layout_document(&doc, fixture.env(), None);
        let pages = &outcome.document.pages;
        assert_eq!(pages.len(), 1);
        assert_eq!(count_text(&pages[0], "Touch"), 1);
        let names: Vec<_> = item_metas(&pages[0]).into_iter().map(|m| m.2).collect();
        assert_eq!(names, vec!["Hugs", "Kissing", "Tickling"]);
        assert_eq!(pages[0].meta_values(FOOTER_META_KEY).collect::<Vec<_>>(), vec!["1/1"]);
        assert_eq!(outcome.items_placed, 3);
        assert_eq!(outcome.splits, 0);
    }

    #[test]
    fn scenario_long_note_splits_across_two_pages() {
        let mut fixture = Fixture::new();
        // Leave exactly section header + name line + gap + 5 note lines (+5pt) on page 1.
        let config = &fixture.config;
        let wanted = Pt::from_i32(30 + 16 + 2 + 60 + 5);
        let header = config.content_max_y() - wanted - config.margins.top - config.legend_height - config.legend_gap;
        fixture.config.full_header_height = header;
        assert!(fixture.config.validate().is_ok());

        let doc = document(vec![Section::new(
            "Talking",
            vec![Item::new("Deep conversations", Status::Talk).with_note(numbered_note(40))],
        )]);
        let outcome = layout_document(&doc, fixture.env(), None);
        let pages = &outcome.document.pages;
        assert_eq!(pages.len(), 2);
        assert_eq!(outcome.splits, 1);

        assert_eq!(
            item_metas(&pages[0]),
            vec![("start".to_string(), 5, "Deep conversations".to_string())]
        );
        assert_eq!(
            item_metas(&pages[1]),
            vec![("end".to_string(), 35, "Deep conversations".to_string())]
        );
        assert_eq!(count_text(&pages[0], "\u{2026}"), 1);
        assert_eq!(count_text(&pages[1], "\u{2026}"), 1);
        assert_eq!(count_text(&pages[0], "line 5"), 1);
        assert_eq!(count_text(&pages[1], "line 6"), 1);
        assert_eq!(count_text(&pages[1], "line 40"), 1);

        // Page 2 body opens with the re-stamped section header before the item.
        let body = body_commands(&pages[1]);
        let title_at = body
            .iter()
            .position(|cmd| matches!(cmd, Command::DrawString { text, .. } if text == "Talking"))
            .unwrap();
        let item_at = body
            .iter()
            .position(|cmd| matches!(cmd, Command::Meta { key, .. } if key == ITEM_META_KEY))
            .unwrap();
        assert!(title_at < item_at);
    }

    #[test]
    fn header_is_not_stamped_without_an_item_below_it() {
        let fixture = Fixture::new();
        let filler: Vec<Item> = (0..37)
            .map(|n| Item::new(format!("Filler {n}"), Status::Maybe))
            .collect();
        let doc = document(vec![
            Section::new("First", filler),
            Section::new("Second", vec![Item::new("Lonely", Status::Must)]),
        ]);
        let outcome = layout_document(&doc, fixture.env(), None);
        for page in &outcome.document.pages {
            let stamps = count_text(page, "Second");
            let placed = item_metas(page).iter().any(|meta| meta.2 == "Lonely");
            assert_eq!(stamps == 1, placed, "header without its item");
        }
    }

    fn position_of_text(commands: &[Command], needle: &str) -> Option<usize> {
        commands
            .iter()
            .position(|cmd| matches!(cmd, Command::DrawString { text, .. } if text == needle))
    }

    fn position_of_item(commands: &[Command], name: &str) -> Option<usize> {
        commands.iter().position(|cmd| {
            matches!(cmd, Command::Meta { key, value } if key == ITEM_META_KEY && value.ends_with(name))
        })
    }

    #[test]
    fn every_section_on_a_shared_page_gets_its_header() {
        let fixture = Fixture::new();
        let doc = document(vec![
            Section::new("Alpha", vec![Item::new("a1", Status::Must)]),
            Section::new("Beta", vec![Item::new("b1", Status::Like), Item::new("b2", Status::Maybe)]),
            Section::new("Gamma", vec![Item::new("g1", Status::Talk)]),
        ]);
        let outcome = layout_document(&doc, fixture.env(), None);
        let pages = &outcome.document.pages;
        assert_eq!(pages.len(), 1);
        for title in ["Alpha", "Beta", "Gamma"] {
            assert_eq!(count_text(&pages[0], title), 1, "{title}");
        }
        let body = body_commands(&pages[0]);
        let order = [
            position_of_text(body, "Alpha"),
            position_of_item(body, "a1"),
            position_of_text(body, "Beta"),
            position_of_item(body, "b1"),
            position_of_item(body, "b2"),
            position_of_text(body, "Gamma"),
            position_of_item(body, "g1"),
        ];
        assert!(order.iter().all(Option::is_some), "{order:?}");
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{order:?}");
    }

    #[test]
    fn section_after_a_split_is_stamped_on_the_continuation_page() {
        let fixture = Fixture::new();
        let doc = document(vec![
            Section::new(
                "Long",
                vec![Item::new("Story", Status::Talk).with_note(numbered_note(80))],
            ),
            Section::new("After", vec![Item::new("Next", Status::Like)]),
        ]);
        let outcome = layout_document(&doc, fixture.env(), None);
        let last = outcome.document.pages.last().unwrap();
        let body = body_commands(last);
        let long_at = position_of_text(body, "Long").unwrap();
        let after_at = position_of_text(body, "After").unwrap();
        let next_at = position_of_item(body, "Next").unwrap();
        assert!(long_at < after_at && after_at < next_at);
    }

    #[test]
    fn split_pieces_draw_exactly_the_unsplit_lines() {
        let fixture = Fixture::new();
        let env = fixture.env();
        let tagged = |tag: &str, lines: usize| {
            Note::plain(
                (1..=lines)
                    .map(|n| format!("{tag} line {n}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        };
        let doc = document(vec![Section::new(
            "Split",
            vec![
                Item::new("First", Status::Like).with_note(tagged("a", 50)),
                Item::new("Second", Status::Must).with_note(tagged("b", 120)),
                Item::new("Third", Status::Maybe).with_note(tagged("c", 7)),
            ],
        )]);
        let outcome = layout_document(&doc, env, None);
        assert!(outcome.splits >= 2);

        let drawn: Vec<String> = outcome
            .document
            .pages
            .iter()
            .flat_map(|page| body_commands(page).iter())
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } if text.contains(" line ") => Some(text.clone()),
                _ => None,
            })
            .collect();
        let expected: Vec<String> = doc.sections[0]
            .items
            .iter()
            .flat_map(|item| wrap_item_note(item, &env))
            .map(|line| line.text())
            .collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn degenerate_item_after_content_costs_one_page_break() {
        let mut fixture = Fixture::new();
        fixture.config.note_line_height = Pt::from_i32(2000);
        let doc = document(vec![Section::new(
            "Odd",
            vec![
                Item::new("Before", Status::Like),
                Item::new("Giant", Status::Maybe).with_note(Note::plain("never fits")),
                Item::new("After", Status::Must),
            ],
        )]);
        let path = temp_log_path("paginate_degenerate");
        let logger = DebugLogger::new(&path).unwrap();
        let outcome = layout_document(&doc, fixture.env(), Some(&logger));
        logger.flush();
        let events = read_events(&path);
        let _ = std::fs::remove_file(path);

        let breaks: Vec<_> = events
            .iter()
            .filter(|event| event["type"] == "layout.page_break")
            .collect();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0]["item"], "Giant");
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].contains("Giant"));

        let pages = &outcome.document.pages;
        assert_eq!(pages.len(), 2);
        let names = |page: &Page| item_metas(page).into_iter().map(|meta| meta.2).collect::<Vec<_>>();
        assert_eq!(names(&pages[0]), vec!["Before"]);
        assert_eq!(names(&pages[1]), vec!["After"]);
        assert_eq!(count_text(&pages[1], "Odd"), 1);
    }

    #[test]
    fn degenerate_items_are_skipped_with_a_warning() {
        let mut fixture = Fixture::new();
        fixture.config.note_line_height = Pt::from_i32(2000);
        let doc = document(vec![Section::new(
            "Odd",
            vec![
                Item::new("Giant", Status::Maybe).with_note(Note::plain("never fits")),
                Item::new("Small", Status::Like),
            ],
        )]);
        let outcome = layout_document(&doc, fixture.env(), None);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].contains("Giant"));
        assert_eq!(outcome.document.pages.len(), 1);
        let names: Vec<_> = item_metas(&outcome.document.pages[0])
            .into_iter()
            .map(|meta| meta.2)
            .collect();
        assert_eq!(names, vec!["Small"]);
    }

    #[test]
    fn empty_document_yields_one_page_with_chrome() {
        let fixture = Fixture::new();
        let outcome = layout_document(&document(Vec::new()), fixture.env(), None);
        assert_eq!(outcome.document.pages.len(), 1);
        assert!(count_text(&outcome.document.pages[0], "Relationship Menu") >= 1);
        assert!(count_text(&outcome.document.pages[0], "Page 1 of 1") == 1);
    }

    #[test]
    fn page_breaks_and_splits_are_traced() {
        let fixture = Fixture::new();
        let items: Vec<Item> = (0..6)
            .map(|n| Item::new(format!("Item {n}"), Status::Like).with_note(numbered_note(20)))
            .collect();
        let doc = document(vec![Section::new("Many", items)]);
        let path = temp_log_path("paginate_trace");
        let logger = DebugLogger::new(&path).unwrap();
        let outcome = layout_document(&doc, fixture.env(), Some(&logger));
        logger.flush();
        let events = read_events(&path);
        let breaks = events
            .iter()
            .filter(|event| event["type"] == "layout.page_break")
            .count();
        let splits = events
            .iter()
            .filter(|event| event["type"] == "layout.item_split")
            .count();
        assert_eq!(breaks + 1, outcome.document.pages.len());
        assert_eq!(splits, outcome.splits);
        let _ = std::fs::remove_file(path);
    }

    fn arb_document() -> impl Strategy<Value = Document> {
        let note = prop::option::of((1usize..60, 0usize..4).prop_map(|(words, newlines)| {
            let mut text = (0..words)
                .map(|n| if n % 7 == 3 { "\u{1F389}".to_string() } else { format!("w{n}") })
                .collect::<Vec<_>>()
                .join(" ");
            for _ in 0..newlines {
                text.push_str("\nmore");
            }
            Note::plain(text)
        }));
        let item = ("[a-z]{1,12}", note).prop_map(|(name, note)| Item {
            name,
            status: Status::Like,
            note,
        });
        let section = ("[A-Z][a-z]{0,8}", prop::collection::vec(item, 0..12))
            .prop_map(|(name, items)| Section::new(name, items));
        prop::collection::vec(section, 0..6).prop_map(document)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn every_note_line_lands_once_and_nothing_overflows(doc in arb_document()) {
            let fixture = Fixture::new();
            let env = fixture.env();
            let outcome = layout_document(&doc, env, None);
            prop_assert!(outcome.skipped.is_empty());

            let mut placed: Vec<(String, usize)> = Vec::new();
            for page in &outcome.document.pages {
                for (piece, lines, name) in item_metas(page) {
                    match placed.last_mut() {
                        Some(last) if piece == "middle" || piece == "end" => {
                            prop_assert_eq!(&last.0, &name);
                            last.1 += lines;
                        }
                        _ => placed.push((name, lines)),
                    }
                }
                let mut font_size = Pt::from_f32(12.0);
                for cmd in body_commands(page) {
                    match cmd {
                        Command::SetFontSize(size) => font_size = *size,
                        Command::DrawString { y, .. } => {
                            let descender = *y + font_size + font_size * DESCENT;
                            prop_assert!(descender <= fixture.config.content_max_y());
                        }
                        Command::DrawRect { y, height, .. } | Command::DrawImage { y, height, .. } => {
                            prop_assert!(*y + *height <= fixture.config.content_max_y());
                        }
                        _ => {}
                    }
                }
            }

            let expected: Vec<(String, usize)> = doc
                .sections
                .iter()
                .flat_map(|section| section.items.iter())
                .map(|item| (item.name.clone(), wrap_item_note(item, &env).len()))
                .collect();
            prop_assert_eq!(placed, expected);
        }
    }

    #[test]
    fn same_document_renders_identically_twice() {
        let fixture = Fixture::new();
        let doc = document(vec![Section::new(
            "Again",
            vec![Item::new("Twice", Status::Must).with_note(numbered_note(90))],
        )]);
        let first = layout_document(&doc, fixture.env(), None);
        let second = layout_document(&doc, fixture.env(), None);
        assert_eq!(first.document.pages.len(), second.document.pages.len());
        for (a, b) in first.document.pages.iter().zip(&second.document.pages) {
            assert_eq!(a.commands, b.commands);
        }
    }
}
