use carebus_error::EventError;

/// Разделитель уровней иерархии имени события.
pub const SEGMENT_DELIM: char = '.';
/// Префикс имени канала брокера.
pub const CHANNEL_PREFIX: &str = "cwf-event-";

/// Проверяет имя события: непустое, без пустых сегментов.
pub fn validate(name: &str) -> Result<(), EventError> {
    let invalid = |reason: &str| EventError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with(SEGMENT_DELIM) {
        return Err(invalid("leading delimiter"));
    }
    if name.ends_with(SEGMENT_DELIM) {
        return Err(invalid("trailing delimiter"));
    }
    if name.split(SEGMENT_DELIM).any(str::is_empty) {
        return Err(invalid("empty segment"));
    }
    Ok(())
}

pub fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split(SEGMENT_DELIM)
}

/// Первый сегмент имени: `STATUS` для `STATUS.TIMING.SERVER`.
pub fn root_segment(name: &str) -> &str {
    name.split(SEGMENT_DELIM).next().unwrap_or(name)
}

/// Родитель имени или `None` для корневого уровня.
pub fn parent(name: &str) -> Option<&str> {
    name.rfind(SEGMENT_DELIM).map(|i| &name[..i])
}

/// Само имя и все его предки, от самого глубокого к корню.
pub fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(name), |n| parent(n))
}

/// Канал брокера, по которому распространяется событие.
///
/// Канал определяется корневым сегментом, поэтому все события одного
/// семейства идут через один канал.
pub fn channel_name(name: &str) -> String {
    format!("{CHANNEL_PREFIX}{}", root_segment(name))
}
