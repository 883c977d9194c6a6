#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: &'static str,
    pub path: &'static str,
}

/// Well-known locations offered by the browser surface.
pub const DEFAULT_BOOKMARKS: &[Bookmark] = &[
    Bookmark {
        name: "Root",
        path: "/",
    },
    Bookmark {
        name: "Applications",
        path: "/Applications",
    },
    Bookmark {
        name: "User Data",
        path: "/var/mobile",
    },
    Bookmark {
        name: "Documents",
        path: "/var/mobile/Documents",
    },
    Bookmark {
        name: "Preferences",
        path: "/var/mobile/Library/Preferences",
    },
    Bookmark {
        name: "Unlock Root",
        path: "/var/jb",
    },
    Bookmark {
        name: "Logs",
        path: "/var/log",
    },
    Bookmark {
        name: "Tmp",
        path: "/tmp",
    },
];
