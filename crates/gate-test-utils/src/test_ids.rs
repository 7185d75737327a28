//! Fixed test IDs and credentials for deterministic tests

use uuid::Uuid;

// Developer IDs (100-199)
pub const TEST_DEVELOPER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_DEVELOPER_BOB: Uuid = Uuid::from_u128(101);

// Admin user IDs (200-299)
pub const TEST_ADMIN_ROOT: Uuid = Uuid::from_u128(200);
pub const TEST_ADMIN_EDITOR: Uuid = Uuid::from_u128(201);

// API key IDs (1000-1099)
pub const TEST_API_KEY_ID_1: Uuid = Uuid::from_u128(1000);
pub const TEST_API_KEY_ID_2: Uuid = Uuid::from_u128(1001);

// Plaintext API keys (distinct 8-character prefixes)
pub const TEST_API_KEY_LEGACY: &str = "LeGaCy01-fixed-test-api-key-sha256-hashed-aa";
pub const TEST_API_KEY_BCRYPT: &str = "BcRyPt02-fixed-test-api-key-bcrypt-hashed-bb";

// Passwords
pub const TEST_ADMIN_PASSWORD: &str = "test-admin-password-do-not-use";
pub const TEST_DEVELOPER_PASSWORD: &str = "test-developer-password-do-not-use";
