use gantry_core::GantryResult;
use rand::Rng;

/// 256-bit symmetric encryption key
pub const ENCRYPTION_KEY_BYTES: usize = 32;

/// 512-bit key, the recommended size for HMAC-SHA512
pub const HMAC_KEY_BYTES: usize = 64;

/// `length` random bytes, hex-encoded
pub fn random_key(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let key: Vec<u8> = (0..length).map(|_| rng.gen()).collect();
    hex::encode(key)
}

pub async fn run() -> GantryResult<()> {
    println!("Generating encryption key");
    println!(
        "Generated Encryption Key (hex): {}",
        random_key(ENCRYPTION_KEY_BYTES)
    );
    println!(
        "Generated HMAC Secret Key (hex): {}",
        random_key(HMAC_KEY_BYTES)
    );
    Ok(())
}
