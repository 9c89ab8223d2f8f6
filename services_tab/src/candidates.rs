//! Candidate encodings for a load

use text_encodings::Encoding;

/// Ordered, de-duplicated encodings a load will try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub encodings: Vec<Encoding>,
    /// The list is a single encoding the user asked for
    pub user_requested: bool,
}

/// Builds the candidate list for a load
///
/// An explicit encoding is used alone. Otherwise the order is: the
/// encoding remembered for the file, the encoding the document is bound to,
/// then the configured auto-detect list.
pub fn build_candidates(
    explicit: Option<Encoding>,
    remembered: Option<Encoding>,
    bound: Option<Encoding>,
    auto_detected: &[Encoding],
) -> Candidates {
    if let Some(encoding) = explicit {
        return Candidates {
            encodings: vec![encoding],
            user_requested: true,
        };
    }

    let mut encodings: Vec<Encoding> = Vec::with_capacity(auto_detected.len() + 2);
    let ordered = remembered
        .into_iter()
        .chain(bound)
        .chain(auto_detected.iter().copied());
    for encoding in ordered {
        if !encodings.contains(&encoding) {
            encodings.push(encoding);
        }
    }
    if encodings.is_empty() {
        encodings.push(Encoding::utf8());
    }

    Candidates {
        encodings,
        user_requested: false,
    }
}
