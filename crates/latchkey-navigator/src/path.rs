/// Empty paths resolve to `/`; a trailing separator on any non-root path
/// is stripped.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }
    if path.len() > 1 && path.ends_with('/') {
        return path[..path.len() - 1].to_owned();
    }
    path.to_owned()
}

pub fn parent_of(path: &str) -> String {
    let components: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if components.len() > 1 {
        format!("/{}", components[..components.len() - 1].join("/"))
    } else {
        "/".to_owned()
    }
}

pub fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}
