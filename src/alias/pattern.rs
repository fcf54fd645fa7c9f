use regex::Regex;

use carebus_error::AliasError;

/// Любая последовательность символов, в том числе через границу сегментов.
pub const WILDCARD_ANY: char = '*';
/// Ровно один сегмент (без точки).
pub const WILDCARD_SEGMENT: char = '?';

/// Скомпилированный шаблон локального имени.
///
/// Шаблон без wildcard'ов совпадает только с идентичной строкой. Шаблон с
/// wildcard'ами компилируется в заякоренное регулярное выражение, где каждый
/// wildcard становится отдельной группой захвата, слева направо.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    matcher: Option<Regex>,
}

impl WildcardPattern {
    pub fn compile(pattern: &str) -> Result<Self, AliasError> {
        if !has_wildcards(pattern) {
            return Ok(Self {
                source: pattern.to_string(),
                matcher: None,
            });
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        let mut buf = [0u8; 4];
        for ch in pattern.chars() {
            match ch {
                WILDCARD_ANY => expr.push_str("(.*)"),
                WILDCARD_SEGMENT => expr.push_str("([^.]+)"),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
            }
        }
        expr.push('$');

        let matcher = Regex::new(&expr).map_err(|e| AliasError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            matcher: Some(matcher),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_exact(&self) -> bool {
        self.matcher.is_none()
    }

    pub fn wildcard_count(&self) -> usize {
        self.source
            .chars()
            .filter(|c| *c == WILDCARD_ANY || *c == WILDCARD_SEGMENT)
            .count()
    }

    pub fn is_match(
        &self,
        key: &str,
    ) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(key),
            None => self.source == key,
        }
    }

    /// Подстроки, захваченные wildcard'ами, в порядке их следования.
    ///
    /// `None`, если ключ не совпал. Для точного шаблона при совпадении
    /// возвращается пустой вектор.
    pub fn captures(
        &self,
        key: &str,
    ) -> Option<Vec<String>> {
        match &self.matcher {
            None => (self.source == key).then(Vec::new),
            Some(re) => {
                let caps = re.captures(key)?;
                Some(
                    caps.iter()
                        .skip(1)
                        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                        .collect(),
                )
            }
        }
    }
}

pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(WILDCARD_ANY) || pattern.contains(WILDCARD_SEGMENT)
}

/// Подставляет захваченные значения в шаблон алиаса.
///
/// i-й wildcard алиаса получает i-й захват; недостающие захваты заменяются
/// пустой строкой, лишние игнорируются. Остальной текст копируется как есть.
pub fn substitute(
    alias_pattern: &str,
    captures: &[String],
) -> String {
    let mut out = String::with_capacity(alias_pattern.len() + 16);
    let mut next = captures.iter();
    for ch in alias_pattern.chars() {
        if ch == WILDCARD_ANY || ch == WILDCARD_SEGMENT {
            if let Some(value) = next.next() {
                out.push_str(value);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
