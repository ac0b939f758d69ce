//! Key pair generation: prime selection, public exponent, modular inverse

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

use super::{KeyPair, PrivateKey, PublicKey};
use crate::{
    entropy::{RandomSource, uniform_in_range, uniform_u32},
    error::CryptoError,
};

/// Maximum candidate draws while searching for one prime
const MAX_PRIME_ATTEMPTS: u32 = 10_000;

/// Maximum redraws of `q` while it equals `p`
const MAX_DISTINCT_ATTEMPTS: u32 = 1_000;

/// Maximum draws of `e` while it shares a factor with `φ(N)`
const MAX_EXPONENT_ATTEMPTS: u32 = 1_000;

/// Smallest public exponent considered
const MIN_PUBLIC_EXPONENT: u32 = 3;

/// Inclusive range from which key generation draws candidate primes.
///
/// The modulus `N = p·q` should exceed the largest digest value or signing
/// works on `H(m) mod N` and loses information. The default range keeps the
/// arithmetic human-scale and is far too small for real security.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeRange {
    /// Smallest candidate
    pub min: u32,
    /// Largest candidate
    pub max: u32,
}

impl PrimeRange {
    /// Candidate range `[min, max]`.
    pub fn new(min: u32, max: u32) -> Result<Self, CryptoError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Check that the range can yield two distinct primes at all.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.min < 2 {
            return Err(CryptoError::invalid_argument(format!(
                "prime range minimum {} is below 2",
                self.min
            )));
        }
        if self.min >= self.max {
            return Err(CryptoError::invalid_argument(format!(
                "prime range [{}, {}] is empty or degenerate",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl Default for PrimeRange {
    fn default() -> Self {
        Self { min: 200, max: 300 }
    }
}

/// Generate a signing key pair with primes drawn from `range`.
///
/// # Errors
///
/// - `InvalidArgument` for an invalid range
/// - `Domain` if no prime is found, `p` and `q` stay equal, or no exponent
///   coprime to `φ(N)` is found within the retry bounds
pub fn generate_keypair<R: RandomSource + ?Sized>(
    range: PrimeRange,
    rng: &mut R,
) -> Result<KeyPair, CryptoError> {
    range.validate()?;

    let p = generate_prime(range, rng)?;
    let mut q = generate_prime(range, rng)?;
    let mut redraws = 0;
    while q == p {
        redraws += 1;
        if redraws > MAX_DISTINCT_ATTEMPTS {
            return Err(CryptoError::domain(format!(
                "no second prime distinct from {p} in [{}, {}]",
                range.min, range.max
            )));
        }
        q = generate_prime(range, rng)?;
    }

    let n = BigUint::from(p) * BigUint::from(q);
    let phi = BigUint::from(p - 1) * BigUint::from(q - 1);

    let e = choose_public_exponent(&phi, rng)?;
    let d = mod_inverse(&e, &phi)?;

    tracing::debug!(bits = n.bits(), "generated signing key pair");

    Ok(KeyPair {
        public: PublicKey { e, n: n.clone() },
        private: PrivateKey { d, n },
    })
}

/// Draw candidates from `range` until one is prime.
pub fn generate_prime<R: RandomSource + ?Sized>(
    range: PrimeRange,
    rng: &mut R,
) -> Result<u32, CryptoError> {
    for _ in 0..MAX_PRIME_ATTEMPTS {
        let candidate = uniform_u32(rng, range.min, range.max)?;
        if is_prime(candidate) {
            return Ok(candidate);
        }
    }

    Err(CryptoError::domain(format!(
        "no prime found in [{}, {}] after {MAX_PRIME_ATTEMPTS} draws",
        range.min, range.max
    )))
}

/// Trial-division primality test.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }

    let n = u64::from(n);
    let mut divisor = 3u64;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Draw `e` uniformly from `[3, φ)` until `gcd(e, φ) = 1`.
fn choose_public_exponent<R: RandomSource + ?Sized>(
    phi: &BigUint,
    rng: &mut R,
) -> Result<BigUint, CryptoError> {
    let low = BigUint::from(MIN_PUBLIC_EXPONENT);
    if *phi <= low {
        return Err(CryptoError::domain(format!("φ(N) = {phi} leaves no exponent candidates")));
    }
    let high = phi - 1u32;

    for _ in 0..MAX_EXPONENT_ATTEMPTS {
        let e = uniform_in_range(rng, &low, &high)?;
        if e.gcd(phi).is_one() {
            return Ok(e);
        }
    }

    Err(CryptoError::domain(format!(
        "no exponent coprime to φ(N) after {MAX_EXPONENT_ATTEMPTS} draws"
    )))
}

/// Modular inverse of `a` mod `m` by the extended Euclidean algorithm.
///
/// # Errors
///
/// - `Domain` if `gcd(a, m) != 1` or `m < 2`
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, CryptoError> {
    if *m < BigUint::from(2u32) {
        return Err(CryptoError::domain(format!("modulus {m} has no inverses")));
    }

    let modulus = BigInt::from_biguint(Sign::Plus, m.clone());
    let (mut old_r, mut r) = (BigInt::from_biguint(Sign::Plus, a % m), modulus.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return Err(CryptoError::domain(format!("{a} has no inverse modulo {m}")));
    }

    let inverse = old_s.mod_floor(&modulus);
    inverse
        .to_biguint()
        .ok_or_else(|| CryptoError::domain("modular inverse reduced to a negative value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeterministicBitGenerator;

    #[test]
    fn small_primes() {
        let primes: Vec<u32> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn composites_in_default_range() {
        assert!(!is_prime(221)); // 13 * 17
        assert!(!is_prime(289)); // 17²
        assert!(is_prime(293));
        assert!(is_prime(u32::MAX - 4)); // 4294967291, largest u32 prime
    }

    #[test]
    fn inverse_of_textbook_example() {
        // 17 * 2753 = 46801 = 15 * 3120 + 1
        let d = mod_inverse(&BigUint::from(17u32), &BigUint::from(3120u32)).unwrap();
        assert_eq!(d, BigUint::from(2753u32));
    }

    #[test]
    fn inverse_requires_coprime() {
        let result = mod_inverse(&BigUint::from(6u32), &BigUint::from(9u32));
        assert!(matches!(result, Err(CryptoError::Domain { .. })));
    }

    #[test]
    fn range_validation() {
        assert!(PrimeRange::new(200, 300).is_ok());
        assert!(PrimeRange::new(1, 300).is_err());
        assert!(PrimeRange::new(300, 300).is_err());
        assert!(PrimeRange::new(300, 200).is_err());
    }

    #[test]
    fn generated_primes_lie_in_range() {
        let mut rng = DeterministicBitGenerator::from_seed(b"primes");
        for _ in 0..20 {
            let p = generate_prime(PrimeRange::default(), &mut rng).unwrap();
            assert!((200..=300).contains(&p));
            assert!(is_prime(p));
        }
    }

    #[test]
    fn keypair_satisfies_rsa_identity() {
        let mut rng = DeterministicBitGenerator::from_seed(b"keypair");
        let pair = generate_keypair(PrimeRange::default(), &mut rng).unwrap();

        assert_eq!(pair.public.n, pair.private.n);
        for m in [0u32, 1, 2, 42, 1000, 39_999] {
            let m = BigUint::from(m) % &pair.public.n;
            let c = m.modpow(&pair.public.e, &pair.public.n);
            assert_eq!(c.modpow(&pair.private.d, &pair.private.n), m);
        }
    }

    #[test]
    fn range_with_single_prime_exhausts() {
        // 24..=28 contains no primes at all
        let mut rng = DeterministicBitGenerator::from_seed(b"none");
        let result = generate_keypair(PrimeRange { min: 24, max: 28 }, &mut rng);
        assert!(matches!(result, Err(CryptoError::Domain { .. })));

        // 23..=28 contains only 23, so p == q forever
        let result = generate_keypair(PrimeRange { min: 23, max: 28 }, &mut rng);
        assert!(matches!(result, Err(CryptoError::Domain { .. })));
    }

    #[test]
    fn keypair_generation_is_reproducible() {
        let mut a = DeterministicBitGenerator::from_seed(b"repeat");
        let mut b = DeterministicBitGenerator::from_seed(b"repeat");
        let pair_a = generate_keypair(PrimeRange::default(), &mut a).unwrap();
        let pair_b = generate_keypair(PrimeRange::default(), &mut b).unwrap();
        assert_eq!(pair_a.public, pair_b.public);
    }
}
