use std::sync::Arc;

use proptest::prelude::*;
use rstest::rstest;

use carebus::{alias::pattern::has_wildcards, error::AliasError, AliasRegistry};

const AUTHORITY: &str = "AUTHORITY";

fn registry() -> AliasRegistry {
    let reg = AliasRegistry::new();
    reg.register(AUTHORITY, "auth.local", Some("auth.alias"))
        .unwrap();
    reg.register(AUTHORITY, "authx*", Some("auth.aliasx*"))
        .unwrap();
    reg.register(AUTHORITY, "authy.*.abc.*", Some("authz.*.xyz.*"))
        .unwrap();
    reg.register(AUTHORITY, "authy.?.def.*", Some("authz.?.xyz.*"))
        .unwrap();
    reg
}

/// Тест проверяет разрешение ключей по точным записям и по шаблонам с
/// позиционной подстановкой захватов.
#[rstest]
#[case("auth.local", Some("auth.alias"))]
#[case("authx.test", Some("auth.aliasx.test"))]
#[case("authx", Some("auth.aliasx"))]
#[case("authy.123.abc.456", Some("authz.123.xyz.456"))]
#[case("authy.9.def.789", Some("authz.9.xyz.789"))]
#[case("authy.5.ghi.987", None)]
#[case("auth.local.extra", None)]
#[case("unrelated", None)]
fn test_resolve_cases(
    #[case] key: &str,
    #[case] expected: Option<&str>,
) {
    let reg = registry();
    assert_eq!(reg.resolve(AUTHORITY, key).as_deref(), expected, "key {key}");
}

/// Тест проверяет, что повторная регистрация заменяет алиас, а пустой
/// алиас удаляет запись.
#[test]
fn test_last_write_wins_and_removal() {
    let reg = registry();
    reg.register(AUTHORITY, "authx*", Some("other*")).unwrap();
    assert_eq!(
        reg.resolve(AUTHORITY, "authx.q").as_deref(),
        Some("other.q")
    );

    reg.register(AUTHORITY, "authx*", None).unwrap();
    assert_eq!(reg.resolve(AUTHORITY, "authx.q"), None);

    reg.register(AUTHORITY, "auth.local", Some("")).unwrap();
    assert_eq!(reg.resolve(AUTHORITY, "auth.local"), None);
}

/// Тест проверяет, что алиасы разных типов не пересекаются.
#[test]
fn test_types_are_isolated() {
    let reg = registry();
    reg.register("PROPERTY", "auth.local", Some("prop.alias"))
        .unwrap();
    assert_eq!(
        reg.resolve("property", "auth.local").as_deref(),
        Some("prop.alias")
    );
    assert_eq!(
        reg.resolve(AUTHORITY, "auth.local").as_deref(),
        Some("auth.alias")
    );
}

#[test]
fn test_malformed_prefixed_key_reported() {
    let reg = AliasRegistry::new();
    let err = reg
        .register_prefixed("AUTHORITY-auth.local", Some("x"))
        .unwrap_err();
    assert!(matches!(err, AliasError::MalformedKey { .. }));
    assert_eq!(
        err.to_string(),
        "Illegal alias key value: AUTHORITY-auth.local"
    );
}

/// Тест проверяет параллельное разрешение во время регистрации.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolve_and_register() {
    let reg = Arc::new(registry());
    let mut tasks = Vec::new();

    for i in 0..8 {
        let reg = Arc::clone(&reg);
        tasks.push(tokio::spawn(async move {
            for j in 0..200 {
                if i % 2 == 0 {
                    reg.register(AUTHORITY, &format!("gen{i}.{j}.*"), Some("g.*"))
                        .unwrap();
                } else {
                    assert_eq!(
                        reg.resolve(AUTHORITY, "authx.test").as_deref(),
                        Some("auth.aliasx.test")
                    );
                }
            }
        }));
    }

    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(reg.get_type(AUTHORITY).len(), 4 + 4 * 200);
}

proptest! {
    /// Шаблон без wildcard'ов совпадает тогда и только тогда, когда ключ
    /// равен шаблону.
    #[test]
    fn prop_exact_pattern_matches_only_itself(
        pattern in "[a-z0-9.+()\\[\\]$^|]{1,12}",
        key in "[a-z0-9.+()\\[\\]$^|]{0,12}",
    ) {
        prop_assume!(!has_wildcards(&pattern));
        let reg = AliasRegistry::new();
        reg.register("T", &pattern, Some("hit")).unwrap();
        let resolved = reg.resolve("T", &key);
        prop_assert_eq!(resolved.is_some(), key == pattern);
        prop_assert!(reg.resolve("T", &pattern).is_some());
    }

    /// `*` в конце шаблона захватывает любой хвост, включая точки.
    #[test]
    fn prop_trailing_star_captures_tail(tail in "[a-z0-9.]{0,16}") {
        let reg = AliasRegistry::new();
        reg.register("T", "root*", Some("alias*")).unwrap();
        let key = format!("root{tail}");
        let expected = format!("alias{tail}");
        prop_assert_eq!(reg.resolve("T", &key), Some(expected));
    }
}
