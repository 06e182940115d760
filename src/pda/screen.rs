// PDAリモコンの画面(16桁10行)
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::array;
use thiserror::Error;

pub const WIDTH: usize = 16;
pub const HEIGHT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenError {
    #[error("line {0} is out of range")]
    LineOutOfRange(usize),
    #[error("columns {start}..{end} are out of order")]
    ColumnsOutOfOrder { start: usize, end: usize },
    #[error("scroll range {start}..={end} is out of range")]
    ScrollOutOfRange { start: usize, end: usize },
}

/// 反転表示の範囲 (start..end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Highlight {
    pub fn contains(&self, line: usize, column: usize) -> bool {
        self.line == line && self.start <= column && column < self.end
    }
}

/// スクロール方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,   // 0xff (-1)
    Down, // 0x01 (+1)
}

impl ScrollDirection {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b as i8 {
            -1 => Some(Self::Up),
            1 => Some(Self::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBuffer {
    lines: [String; HEIGHT],
    highlight: Option<Highlight>,
    // 行全体を反転表示した行(メニューの選択行)
    cursor: Option<usize>,
}

fn blank() -> String {
    " ".repeat(WIDTH)
}

// 空白で埋めて16桁にする
fn fit(text: &str) -> String {
    text.chars()
        .chain(std::iter::repeat(' '))
        .take(WIDTH)
        .collect()
}

fn check_line(line: usize) -> Result<(), ScreenError> {
    if line < HEIGHT {
        Ok(())
    } else {
        Err(ScreenError::LineOutOfRange(line))
    }
}

impl ScreenBuffer {
    pub fn new() -> Self {
        ScreenBuffer {
            lines: array::from_fn(|_| blank()),
            highlight: None,
            cursor: None,
        }
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(|s| s.as_str())
    }

    pub fn lines(&self) -> &[String; HEIGHT] {
        &self.lines
    }

    /// 上端のステータス行と下端のフッター行を除く行
    pub fn interior(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .skip(1)
            .take(HEIGHT - 2)
            .map(|(n, s)| (n, s.as_str()))
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.highlight
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// 選択行の内容
    pub fn cursor_line(&self) -> Option<&str> {
        self.cursor.and_then(|n| self.line(n))
    }

    /// 画面消去
    pub fn clear(&mut self) {
        self.lines.iter_mut().for_each(|s| *s = blank());
        self.highlight = None;
        self.cursor = None;
    }

    /// 1行書き込む
    pub fn write_line(&mut self, line: usize, text: &str) -> Result<(), ScreenError> {
        check_line(line)?;
        self.lines[line] = fit(text);
        Ok(())
    }

    /// 行全体を反転表示する
    pub fn invert_line(&mut self, line: usize) -> Result<(), ScreenError> {
        check_line(line)?;
        self.highlight = Some(Highlight {
            line,
            start: 0,
            end: WIDTH,
        });
        self.cursor = Some(line);
        Ok(())
    }

    /// 行の一部を反転表示する
    pub fn invert_chars(&mut self, line: usize, start: usize, end: usize) -> Result<(), ScreenError> {
        check_line(line)?;
        let (start, end) = (start.min(WIDTH), end.min(WIDTH));
        if start > end {
            return Err(ScreenError::ColumnsOutOfOrder { start, end });
        }
        self.highlight = Some(Highlight { line, start, end });
        Ok(())
    }

    /// start行からend行までをスクロールする
    pub fn scroll(
        &mut self,
        start: usize,
        end: usize,
        direction: ScrollDirection,
    ) -> Result<(), ScreenError> {
        if start > end || end >= HEIGHT {
            return Err(ScreenError::ScrollOutOfRange { start, end });
        }
        match direction {
            ScrollDirection::Up => {
                self.lines[start..=end].rotate_left(1);
                self.lines[end] = blank();
            }
            ScrollDirection::Down => {
                self.lines[start..=end].rotate_right(1);
                self.lines[start] = blank();
            }
        }
        Ok(())
    }

    /// 画面をHTMLにする(<pre>要素)
    pub fn render_html(&self) -> String {
        let mut html = String::from("<pre>");
        for (n, line) in self.lines.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                match self.highlight {
                    Some(h) if h.line == n && h.start == col && h.start < h.end => {
                        html.push_str(r#"<span style="background-color: #FFFF00"><b>"#)
                    }
                    _ => {}
                }
                match c {
                    '<' => html.push_str("&lt;"),
                    '>' => html.push_str("&gt;"),
                    '&' => html.push_str("&amp;"),
                    c => html.push(c),
                }
                match self.highlight {
                    Some(h) if h.line == n && h.end == col + 1 && h.start < h.end => {
                        html.push_str("</b></span>")
                    }
                    _ => {}
                }
            }
            html.push('\n');
        }
        html.push_str("</pre>");
        html
    }

    /// 画面をテキストにする(反転表示部分を[]で囲む)
    pub fn render_text(&self) -> String {
        let border = format!("+{}+", "-".repeat(WIDTH));
        let mut text = vec![border.clone()];
        for (n, line) in self.lines.iter().enumerate() {
            let s = match self.highlight {
                Some(h) if h.line == n && h.start < h.end => {
                    let chars: Vec<char> = line.chars().collect();
                    format!(
                        "|{}[{}]{}|",
                        chars[..h.start].iter().collect::<String>(),
                        chars[h.start..h.end].iter().collect::<String>(),
                        chars[h.end..].iter().collect::<String>()
                    )
                }
                _ => format!("|{}|", line),
            };
            text.push(s);
        }
        text.push(border);
        text.join("\n")
    }
}

impl Default for ScreenBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test1() {
    let mut screen = ScreenBuffer::new();
    screen.write_line(3, "POOL MODE    OFF").unwrap();
    screen.write_line(4, "SPA").unwrap();
    screen.write_line(5, "A VERY LONG LINE OF TEXT").unwrap();
    assert_eq!(screen.line(3), Some("POOL MODE    OFF"));
    assert_eq!(screen.line(4), Some("SPA             "));
    assert_eq!(screen.line(5), Some("A VERY LONG LINE"));
    assert!(screen.lines().iter().all(|s| s.chars().count() == WIDTH));
    assert_eq!(
        screen.write_line(10, "X"),
        Err(ScreenError::LineOutOfRange(10))
    );
}

#[test]
fn test2() {
    // 上スクロールして下スクロールすると位置は戻るが、押し出された行は空白になる
    let mut screen = ScreenBuffer::new();
    for n in 0..HEIGHT {
        screen.write_line(n, &format!("LINE {}", n)).unwrap();
    }
    let before = screen.lines().clone();

    screen.scroll(2, 5, ScrollDirection::Up).unwrap();
    assert_eq!(screen.line(2), Some(before[3].as_str()));
    assert_eq!(screen.line(4), Some(before[5].as_str()));
    assert_eq!(screen.line(5), Some(blank().as_str()));

    screen.scroll(2, 5, ScrollDirection::Down).unwrap();
    assert_eq!(screen.line(2), Some(blank().as_str()));
    for n in 3..=5 {
        assert_eq!(screen.line(n), Some(before[n].as_str()));
    }
    assert_eq!(screen.line(1), Some(before[1].as_str()));
    assert_eq!(screen.line(6), Some(before[6].as_str()));
}

#[test]
fn test3() {
    assert_eq!(ScrollDirection::from_byte(0xff), Some(ScrollDirection::Up));
    assert_eq!(ScrollDirection::from_byte(0x01), Some(ScrollDirection::Down));
    assert_eq!(ScrollDirection::from_byte(0x00), None);
    let mut screen = ScreenBuffer::new();
    assert!(screen.scroll(5, 10, ScrollDirection::Up).is_err());
    assert!(screen.scroll(6, 5, ScrollDirection::Up).is_err());
}

#[test]
fn test4() {
    let mut screen = ScreenBuffer::new();
    screen.invert_line(4).unwrap();
    assert_eq!(screen.cursor(), Some(4));
    assert_eq!(
        screen.highlight(),
        Some(Highlight {
            line: 4,
            start: 0,
            end: WIDTH
        })
    );
    // 部分反転は選択行を変えない
    screen.invert_chars(6, 3, 40).unwrap();
    assert_eq!(screen.cursor(), Some(4));
    assert_eq!(
        screen.highlight(),
        Some(Highlight {
            line: 6,
            start: 3,
            end: WIDTH
        })
    );
    assert!(screen.invert_chars(6, 8, 2).is_err());
    screen.clear();
    assert_eq!(screen.cursor(), None);
    assert_eq!(screen.highlight(), None);
    assert!(screen.lines().iter().all(|s| s.trim().is_empty()));
}

#[test]
fn test5() {
    let mut screen = ScreenBuffer::new();
    screen.write_line(1, "A<B").unwrap();
    screen.invert_chars(1, 0, 3).unwrap();
    let html = screen.render_html();
    assert!(html.starts_with("<pre>"));
    assert!(html.ends_with("</pre>"));
    assert!(html.contains(
        r#"<span style="background-color: #FFFF00"><b>A&lt;B</b></span>"#
    ));
    let text = screen.render_text();
    assert!(text.contains("[A<B]"));
    assert_eq!(text.lines().count(), HEIGHT + 2);
}
