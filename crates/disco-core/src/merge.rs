pub fn sticky_text(current: Option<String>, incoming: Option<&str>) -> Option<String> {
    match incoming {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => current,
    }
}

pub fn sticky_count(current: u64, incoming: Option<u64>) -> u64 {
    match incoming {
        Some(value) if value != 0 => value,
        _ => current,
    }
}

pub fn latch(current: bool, incoming: Option<bool>) -> bool {
    current || incoming.unwrap_or(false)
}

/// First-writer-wins latch: returns `(reached, first)`.
///
/// `first` can only turn true on the call that moves `reached` from false to
/// true; afterwards both are frozen.
pub fn latch_first(reached: bool, first: bool) -> (bool, bool) {
    if reached {
        (true, first)
    } else {
        (true, true)
    }
}

/// An event applies when it is not older than the stored watermark; ties apply.
pub fn is_current(stored: i64, incoming: Option<i64>) -> bool {
    incoming.is_some_and(|timestamp| stored <= timestamp)
}

pub fn advance_watermark(stored: i64, incoming: i64) -> i64 {
    stored.max(incoming)
}

pub(crate) fn assign<T: PartialEq>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}
