//! Secure cookie 的性质测试

use httpx::http::{CookieError, CookieKeys, SecureCookie};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

const SIGNING: [u8; 32] = [7u8; 32];
const ENCRYPTION: [u8; 32] = [9u8; 32];

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    visits: u32,
    admin: bool,
}

fn arb_session() -> impl Strategy<Value = Session> {
    ("[a-zA-Z0-9 _.@-]{0,40}", any::<u32>(), any::<bool>()).prop_map(|(user, visits, admin)| {
        Session {
            user,
            visits,
            admin,
        }
    })
}

fn signed() -> SecureCookie {
    SecureCookie::new(CookieKeys::new(SIGNING.to_vec(), None).unwrap())
}

fn encrypted() -> SecureCookie {
    SecureCookie::new(CookieKeys::new(SIGNING.to_vec(), Some(&ENCRYPTION[..])).unwrap())
}

/// 把第 `index` 个字符替换为字母表中另一个字符
fn tamper(encoded: &str, index: usize, shift: usize) -> String {
    let mut bytes = encoded.as_bytes().to_vec();
    let index = index % bytes.len();
    let current = ALPHABET.iter().position(|&c| c == bytes[index]).unwrap();
    bytes[index] = ALPHABET[(current + 1 + shift % (ALPHABET.len() - 1)) % ALPHABET.len()];
    String::from_utf8(bytes).unwrap()
}

proptest! {
    /// Property: 签名 cookie 解码得到原值
    #[test]
    fn proptest_signed_round_trip(session in arb_session(), name in "[a-z]{1,16}") {
        let codec = signed();
        let encoded = codec.encode(&name, &session).unwrap();
        let decoded: Session = codec.decode(&name, &encoded).unwrap();
        prop_assert_eq!(decoded, session);
    }

    /// Property: 加密 cookie 解码得到原值
    #[test]
    fn proptest_encrypted_round_trip(session in arb_session(), name in "[a-z]{1,16}") {
        let codec = encrypted();
        let encoded = codec.encode(&name, &session).unwrap();
        let decoded: Session = codec.decode(&name, &encoded).unwrap();
        prop_assert_eq!(decoded, session);
    }

    /// Property: 任意单字符修改都无法解码
    #[test]
    fn proptest_single_char_tamper_is_rejected(
        session in arb_session(),
        index in any::<usize>(),
        shift in any::<usize>(),
        encrypt in any::<bool>(),
    ) {
        let codec = if encrypt { encrypted() } else { signed() };
        let encoded = codec.encode("session", &session).unwrap();
        let tampered = tamper(&encoded, index, shift);
        prop_assert_ne!(&tampered, &encoded);

        let result = codec.decode::<Session>("session", &tampered);
        prop_assert!(matches!(result, Err(CookieError::Decode)));
    }

    /// Property: 名称参与校验，换名解码失败
    #[test]
    fn proptest_name_is_bound(session in arb_session()) {
        let codec = signed();
        let encoded = codec.encode("session", &session).unwrap();
        prop_assert!(codec.decode::<Session>("sessions", &encoded).is_err());
    }
}
