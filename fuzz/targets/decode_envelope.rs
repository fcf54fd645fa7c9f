#![no_main]

use libfuzzer_sys::fuzz_target;

use carebus::{EnvelopeCodec, JsonCodec};

fuzz_target!(|data: &[u8]| {
    // Декодер не должен паниковать ни на каких входных данных.
    if let Ok(envelope) = JsonCodec.decode(data) {
        let encoded = JsonCodec.encode(&envelope).expect("re-encode");
        let again = JsonCodec.decode(&encoded).expect("decode re-encoded");
        assert_eq!(again.event, envelope.event);
        assert_eq!(again.publisher, envelope.publisher);
        assert_eq!(again.recipients, envelope.recipients);
    }
});
