#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryType {
    Callback,
    Enum,
    Function,
    Module,
    Type,
}

impl EntryType {
    /// Label stored in `searchIndex.type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Callback => "Callback",
            Self::Enum => "Enum",
            Self::Function => "Function",
            Self::Module => "Module",
            Self::Type => "Type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryJob {
    pub entry_type: EntryType,
    /// Listing page, relative to the site base URL.
    pub listing_path: &'static str,
}

pub const CATEGORY_JOBS: [CategoryJob; 5] = [
    CategoryJob {
        entry_type: EntryType::Callback,
        listing_path: "/wiki/Category:Callbacks",
    },
    CategoryJob {
        entry_type: EntryType::Enum,
        listing_path: "/w/index.php?title=Special:Ask&offset=0&limit=500&q=%5B%5BCategory%3AEnums%5D%5D&p=headers%3Dhide%2Fformat%3Dbroadtable&po=%3FDescription%0A",
    },
    CategoryJob {
        entry_type: EntryType::Function,
        listing_path: "/w/index.php?title=Special:Ask&offset=0&limit=500&q=%5B%5BCategory%3AFunctions%5D%5D&p=headers%3Dhide%2Fformat%3Dbroadtable&po=%3FDescription%0A",
    },
    CategoryJob {
        entry_type: EntryType::Module,
        listing_path: "/w/index.php?title=Special:Ask&offset=0&limit=500&q=%5B%5BCategory%3AModules%5D%5D&p=headers%3Dhide%2Fformat%3Dbroadtable&po=%3FDescription%0A",
    },
    CategoryJob {
        entry_type: EntryType::Type,
        listing_path: "/w/index.php?title=Special:Ask&offset=0&limit=500&q=%5B%5BCategory%3ATypes%5D%5D&p=headers%3Dhide%2Fformat%3Dbroadtable&po=%3FDescription%0A",
    },
];
