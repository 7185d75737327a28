#![no_main]

use gate_service::crypto::{derive_admin_jwt_key, derive_developer_jwt_key};
use gate_service::tokens::{AdminTokenCodec, DeveloperTokenCodec};
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    let secret = [7u8; 32];
    let (Ok(admin_key), Ok(developer_key)) =
        (derive_admin_jwt_key(&secret), derive_developer_jwt_key(&secret))
    else {
        return;
    };

    let admin = AdminTokenCodec::new(
        admin_key,
        "fuzz".to_string(),
        Duration::from_secs(3600),
        Duration::from_secs(300),
    );
    let developer = DeveloperTokenCodec::new(
        developer_key,
        "fuzz".to_string(),
        Duration::from_secs(3600),
        Duration::from_secs(300),
    );

    // Must never panic, whatever the input
    let _ = admin.validate(token);
    let _ = developer.validate(token);
    let _ = common::bearer::parse_bearer(Some(token));
});
