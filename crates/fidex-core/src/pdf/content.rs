//! Content stream walker recovering text positions and ruling lines.
//!
//! Only the operators that move the text cursor or draw straight lines are
//! interpreted. Glyph widths are estimated from the font size, since tables
//! only need relative gaps between fragments. String operands are decoded
//! through the page fonts' `/Encoding` and `/ToUnicode` maps.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, ObjectId, StringFormat};
use tracing::debug;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

/// Rectangles thinner than this are drawn rules, not boxes.
const RULE_THICKNESS: f32 = 2.0;

/// Shortest segment kept as a rule.
const MIN_RULE_LENGTH: f32 = 1.0;

/// A run of text shown at one position, in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: f32,
    /// Baseline.
    pub y: f32,
    /// Estimated advance.
    pub width: f32,
    pub text: String,
}

/// An axis-aligned line drawn on the page, in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Horizontal { y: f32, x1: f32, x2: f32 },
    Vertical { x: f32, y1: f32, y2: f32 },
}

/// Everything the table detectors need from one page.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    pub fragments: Vec<TextFragment>,
    pub rules: Vec<Rule>,
}

/// Affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn then(self, other: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (x * a + y * c + e, x * b + y * d + f)
    }
}

/// Text encodings of the fonts a page's resources name.
#[derive(Default)]
pub struct FontEncodings<'a> {
    by_name: BTreeMap<Vec<u8>, Encoding<'a>>,
}

impl<'a> FontEncodings<'a> {
    /// Encodings of every font reachable from the page's resources.
    /// Fonts lopdf cannot map are left out and decoded as text strings.
    pub fn for_page(document: &'a Document, page_id: ObjectId) -> Self {
        let fonts = match document.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                debug!("No fonts for page {:?}: {}", page_id, e);
                return Self::default();
            }
        };

        let by_name = fonts
            .into_iter()
            .filter_map(|(name, font)| match font.get_font_encoding(document) {
                Ok(encoding) => Some((name, encoding)),
                Err(e) => {
                    debug!("Font {}: {}", String::from_utf8_lossy(&name), e);
                    None
                }
            })
            .collect();

        Self { by_name }
    }

    /// Decode a string operand shown with `font`.
    pub fn decode(&self, font: Option<&[u8]>, bytes: &[u8]) -> String {
        font.and_then(|name| self.by_name.get(name))
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| {
                let object = Object::String(bytes.to_vec(), StringFormat::Literal);
                lopdf::decode_text_string(&object).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
            })
    }
}

struct Walker<'f, 'a> {
    fonts: &'f FontEncodings<'a>,
    font: Option<Vec<u8>>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    current_point: Option<(f32, f32)>,
    pending: Vec<Rule>,
    geometry: PageGeometry,
}

impl PageGeometry {
    pub fn from_operations(operations: &[Operation], fonts: &FontEncodings<'_>) -> Self {
        let mut walker = Walker {
            fonts,
            font: None,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            current_point: None,
            pending: Vec::new(),
            geometry: PageGeometry::default(),
        };

        for op in operations {
            walker.step(op);
        }

        walker.geometry
    }
}

impl Walker<'_, '_> {
    fn step(&mut self, op: &Operation) {
        let nums = || numbers(&op.operands);

        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix(&nums()) {
                    self.ctm = m.then(self.ctm);
                }
            }

            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                self.font = op.operands.first().and_then(|f| f.as_name().ok()).map(<[u8]>::to_vec);
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(&leading) = nums().first() {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let [tx, ty] = nums()[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = nums()[..] {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix(&nums()) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),

            "Tj" => {
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.move_line(0.0, -self.leading);
                if let Some(bytes) = op.operands.get(2).and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match string_bytes(item) {
                            Some(bytes) => self.show(bytes),
                            None => {
                                if let Some(adjust) = number(item) {
                                    self.advance(-adjust / 1000.0 * self.font_size);
                                }
                            }
                        }
                    }
                }
            }

            "m" => {
                if let [x, y] = nums()[..] {
                    self.current_point = Some(self.ctm.apply(x, y));
                }
            }
            "l" => {
                if let [x, y] = nums()[..] {
                    let to = self.ctm.apply(x, y);
                    if let Some(from) = self.current_point {
                        self.pending.extend(segment(from, to));
                    }
                    self.current_point = Some(to);
                }
            }
            "re" => {
                if let [x, y, w, h] = nums()[..] {
                    self.rectangle(x, y, w, h);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                self.geometry.rules.append(&mut self.pending);
                self.current_point = None;
            }
            "n" => {
                self.pending.clear();
                self.current_point = None;
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(self.tlm);
        self.tm = self.tlm;
    }

    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translate(tx, 0.0).then(self.tm);
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = self.fonts.decode(self.font.as_deref(), bytes);
        let glyphs = text.chars().count() as f32;

        let origin = self.tm.then(self.ctm);
        let (x, y) = origin.apply(0.0, 0.0);
        let advance = glyphs * self.font_size * GLYPH_WIDTH;
        let (end_x, _) = origin.apply(advance, 0.0);
        self.advance(advance);

        if text.trim().is_empty() {
            return;
        }

        self.geometry.fragments.push(TextFragment {
            x,
            y,
            width: (end_x - x).abs(),
            text,
        });
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let (x1, y1) = self.ctm.apply(x, y);
        let (x2, y2) = self.ctm.apply(x + w, y + h);
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (bottom, top) = (y1.min(y2), y1.max(y2));

        if top - bottom <= RULE_THICKNESS {
            self.pending.extend(segment((left, (top + bottom) / 2.0), (right, (top + bottom) / 2.0)));
        } else if right - left <= RULE_THICKNESS {
            self.pending.extend(segment(((left + right) / 2.0, bottom), ((left + right) / 2.0, top)));
        } else {
            self.pending.extend(segment((left, bottom), (right, bottom)));
            self.pending.extend(segment((left, top), (right, top)));
            self.pending.extend(segment((left, bottom), (left, top)));
            self.pending.extend(segment((right, bottom), (right, top)));
        }
        self.current_point = Some((x1, y1));
    }
}

/// Classify a segment as a horizontal or vertical rule. Diagonals and specks yield nothing.
fn segment(from: (f32, f32), to: (f32, f32)) -> Option<Rule> {
    let (dx, dy) = ((to.0 - from.0).abs(), (to.1 - from.1).abs());

    if dy < MIN_RULE_LENGTH && dx >= MIN_RULE_LENGTH {
        Some(Rule::Horizontal {
            y: (from.1 + to.1) / 2.0,
            x1: from.0.min(to.0),
            x2: from.0.max(to.0),
        })
    } else if dx < MIN_RULE_LENGTH && dy >= MIN_RULE_LENGTH {
        Some(Rule::Vertical {
            x: (from.0 + to.0) / 2.0,
            y1: from.1.min(to.1),
            y2: from.1.max(to.1),
        })
    } else {
        None
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn matrix(values: &[f32]) -> Option<Matrix> {
    match values {
        &[a, b, c, d, e, f] => Some(Matrix([a, b, c, d, e, f])),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}
