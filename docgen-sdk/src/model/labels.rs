//! Sequence label schemes for question depths

/// Labelling scheme used at a given question depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScheme {
    /// 1, 2, 3 ...
    Numeric,
    /// a, b, c ... aa, ab ...
    Letter,
    /// i, ii, iii, iv ...
    Roman,
}

impl SequenceScheme {
    /// Scheme for a zero-based depth. Depths past the last level reuse roman numerals.
    pub fn for_depth(depth: usize) -> Self {
        match depth {
            0 => SequenceScheme::Numeric,
            1 => SequenceScheme::Letter,
            _ => SequenceScheme::Roman,
        }
    }

    /// Label for a zero-based sibling position
    pub fn label(&self, index: usize) -> String {
        match self {
            SequenceScheme::Numeric => (index + 1).to_string(),
            SequenceScheme::Letter => letter_label(index),
            SequenceScheme::Roman => roman_label(index + 1),
        }
    }

    /// Shorthand for `for_depth(depth).label(index)`
    pub fn label_for(depth: usize, index: usize) -> String {
        Self::for_depth(depth).label(index)
    }
}

// Bijective base-26: 0 -> a, 25 -> z, 26 -> aa
fn letter_label(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'a' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

fn roman_label(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];

    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}
