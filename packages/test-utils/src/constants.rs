/// Oracle secret used across tests. Never use outside tests.
pub const ORACLE_SECRET: [u8; 32] = [
    155, 112, 1, 86, 197, 238, 25, 119, 90, 109, 241, 199, 214, 248, 145, 209, 253, 107, 11, 21,
    162, 36, 125, 70, 42, 12, 110, 21, 177, 251, 9, 79,
];
pub const ORACLE_SECRET_HEX: &str =
    "9b700156c5ee19775a6df1c7d6f891d1fd6b0b15a2247d462a0c6e15b1fb094f";
pub const ORACLE_PUBLIC_KEY_HEX: &str =
    "261f9b464d547bc49ba6695f6fd18cc39b9387b79ffdb9300604f400b982aa4f";

// Signing fixture: market "m1" resolves YES at height 880000.
pub const FIXTURE_MARKET_ID: &str = "m1";
pub const FIXTURE_BLOCK_HEIGHT: u64 = 880_000;
pub const FIXTURE_CANONICAL_MESSAGE: &str =
    r#"{"asset_id":"m1","outcome":"YES","block_height":880000}"#;
pub const FIXTURE_DIGEST_HEX: &str =
    "231ec7b1c008bf61e158e9177952c92d4add4d51a7ed1b4780c87798a170500a";
pub const FIXTURE_SIGNATURE_HEX: &str = "0eac9b334475adf2e0901d6f6d874650a8aed905db5a012311aad2b1eeeb998ce1f1b98e42cc718281769fb277041145b674d47f2769ef12687db4acb0bfda5e";

/// First block the mock ledger confirms into
pub const MOCK_START_BLOCK: u64 = 880_001;
