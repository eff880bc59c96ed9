use super::TallyError;

/// Project buckets, keyed by Google Calendar's event color numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Lavender,
    Sage,
    Grape,
    Flamingo,
    Banana,
    Tangerine,
    Peacock,
    Graphite,
    Unspecified,
}

// Index is colorId - 1.
const BY_COLOR_ID: [Category; 8] = [
    Category::Lavender,
    Category::Sage,
    Category::Grape,
    Category::Flamingo,
    Category::Banana,
    Category::Tangerine,
    Category::Peacock,
    Category::Graphite,
];

impl Category {
    /// Events without a color are `Unspecified`. A color outside 1-8 is an error rather
    /// than a silent fallback.
    pub fn from_color_id(color_id: Option<&str>) -> Result<Self, TallyError> {
        let Some(raw) = color_id else {
            return Ok(Category::Unspecified);
        };

        raw.trim()
            .parse::<usize>()
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|idx| BY_COLOR_ID.get(idx).copied())
            .ok_or_else(|| TallyError::UnknownColor(raw.to_owned()))
    }

    pub fn color_id(&self) -> Option<u8> {
        BY_COLOR_ID
            .iter()
            .position(|c| c == self)
            .and_then(|idx| u8::try_from(idx + 1).ok())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Lavender => "11",
            Category::Sage => "#PeopleMgmt",
            Category::Grape => "33",
            Category::Flamingo => "Meta/Organizing",
            Category::Banana => "Nicktime",
            Category::Tangerine => "66",
            Category::Peacock => "77",
            Category::Graphite => "AWAY",
            Category::Unspecified => "Unspecified",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
