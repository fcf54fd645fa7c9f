#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use carebus::AliasRegistry;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    pattern: String,
    alias: String,
    key: String,
}

fuzz_target!(|input: FuzzInput| {
    let reg = AliasRegistry::new();
    // Регистрация любых строк не должна паниковать.
    if reg
        .register("FUZZ", &input.pattern, Some(&input.alias))
        .is_err()
    {
        return;
    }
    let _ = reg.resolve("FUZZ", &input.key);

    // Шаблон всегда разрешается сам в себя, если не содержит wildcard'ов.
    if !carebus::alias::pattern::has_wildcards(&input.pattern) && !input.alias.is_empty() {
        assert_eq!(
            reg.resolve("FUZZ", &input.pattern).as_deref(),
            Some(input.alias.as_str())
        );
    }
});
