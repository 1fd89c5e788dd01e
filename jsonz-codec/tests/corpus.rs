//! Round trips over a generated corpus covering every value shape
//!
//! The corpus mirrors a randomised test-data generator: one object holding
//! every integer width, big integers, decimals, long strings, all array
//! forms and nested empty containers, plus each member on its own.

use jsonz_codec::{
    encode, Decimal, Document, Map, Path, ReadOptions, StringMapMode, Value, WriteOptions,
};
use jsonz_format::constants::*;
use num_bigint::{BigInt, Sign};
use num_traits::One;

/// xorshift64*; deterministic so failures reproduce
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn bool(&mut self) -> bool {
        self.next() & 1 == 1
    }

    /// Uniform-ish integer in `lo..=hi`
    fn int(&mut self, lo: &BigInt, hi: &BigInt) -> BigInt {
        let span: BigInt = hi - lo + BigInt::one();
        let width = span.to_bytes_le().1.len() + 8;
        let noise: Vec<u8> = (0..width).map(|_| self.next() as u8).collect();
        lo + BigInt::from_bytes_le(Sign::Plus, &noise) % span
    }

    fn char(&mut self, ascii: bool) -> char {
        loop {
            let code = if ascii {
                self.below(128) as u32
            } else {
                self.below(0x11_0000) as u32
            };
            if let Some(ch) = char::from_u32(code) {
                return ch;
            }
        }
    }

    fn string(&mut self, len: usize, ascii: bool) -> String {
        (0..len).map(|_| self.char(ascii)).collect()
    }

    fn digits(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.below(10) as u8))
            .collect()
    }
}

fn pow2(bits: usize) -> BigInt {
    BigInt::one() << bits
}

fn int(n: BigInt) -> Value {
    Value::Integer(n)
}

fn decimal(text: &str) -> Value {
    Value::Decimal(Decimal::from_str_exact(text).expect("decimal text"))
}

fn ints(rng: &mut Rng, count: usize, lo: &BigInt, hi: &BigInt, negative: bool) -> Value {
    Value::Array(
        (0..count)
            .map(|_| {
                let n = rng.int(lo, hi);
                int(if negative { -n } else { n })
            })
            .collect(),
    )
}

fn corpus(seed: u64) -> Map {
    let mut rng = Rng(seed);
    let one = BigInt::one();
    let zero = BigInt::from(0);
    let upper = pow2(4096);
    let r = |lo: usize, hi: usize| (pow2(lo), pow2(hi) - BigInt::one());
    let (r32, r56) = (pow2(32), pow2(56) - &one);
    let (r64, r2040) = r(64, 2040);

    let mut m = Map::new();
    let mut put = |key: &str, value: Value| {
        m.insert(key.to_string(), value);
    };

    put("boolean true", Value::Bool(true));
    put("boolean false", Value::Bool(false));
    put("null", Value::Null);
    put("string 0", Value::from(""));
    put("string ascii", Value::String(rng.string(4_000, true)));
    put("string utf-8", Value::String(rng.string(4_000, false)));
    put("resizing integer 1", int(rng.int(&r32, &r56)));
    put("resizing integer 2", int(rng.int(&r64, &r2040)));
    put("negative resizing integer 1", int(-rng.int(&r32, &r56)));
    put("negative resizing integer 2", int(-rng.int(&r64, &r2040)));
    put("unsigned 8-bit defined integer", int(rng.int(&zero, &BigInt::from(255))));
    put("unsigned 8-bit defined integer 2", int(zero.clone()));
    for (label, lo, hi) in [
        ("16", 8, 16),
        ("24", 16, 24),
        ("32", 24, 32),
        ("64", 56, 64),
    ] {
        let (lo, hi) = r(lo, hi);
        put(
            &format!("unsigned {}-bit defined integer", label),
            int(rng.int(&lo, &hi)),
        );
        put(
            &format!("negative {}-bit defined integer", label),
            int(-rng.int(&lo, &hi)),
        );
    }
    put("negative 8-bit defined integer", int(-rng.int(&one, &BigInt::from(255))));
    put("big integer", int(rng.int(&pow2(2040), &upper)));
    put("negative big integer", int(-rng.int(&pow2(2040), &upper)));
    let (a, b) = (rng.digits(300), rng.digits(300));
    put("decimal 1", decimal(&format!("{}.{}", a.trim_start_matches('0'), b)));
    let (a, b) = (rng.digits(300), rng.digits(300));
    put("decimal 2", decimal(&format!("-{}.{}", a.trim_start_matches('0'), b)));
    let exponent = 16 + rng.below(285);
    put(
        "decimal 3",
        decimal(&format!("{}.{}e+{}", 1 + rng.below(9), rng.digits(15), exponent)),
    );
    put(
        "decimal 4",
        decimal(&format!("-{}.{}e+{}", 1 + rng.below(9), rng.digits(15), exponent)),
    );

    let mut meow = Map::new();
    meow.insert("meow".to_string(), Value::from("meow"));
    put("object 1", Value::Object(meow));
    put("object 2", Value::Object(Map::new()));
    let mut nested = Map::new();
    nested.insert("meow".to_string(), Value::Object(Map::new()));
    put("object 3", Value::Object(nested));

    put("multi-type array 1", Value::Array(Vec::new()));
    put(
        "multi-type array 2",
        Value::Array(vec![Value::Array(Vec::new()); 100]),
    );
    put("null array 1", Value::Array(vec![Value::Null]));
    put("null array 2", Value::Array(vec![Value::Null; 1_000]));
    put("bool array 1", Value::Array(vec![Value::Bool(true)]));
    put("bool array 2", Value::Array(vec![Value::Bool(true); 1_000]));
    put("bool array 3", Value::Array(vec![Value::Bool(false)]));
    put("bool array 4", Value::Array(vec![Value::Bool(false); 1_000]));
    put(
        "bool array 5",
        Value::Array((0..1_000).map(|_| Value::Bool(rng.bool())).collect()),
    );
    put(
        "string array 1",
        Value::Array((0..200).map(|_| Value::String(rng.string(100, false))).collect()),
    );
    put(
        "string array 2",
        Value::Array((0..1_000).map(|_| Value::String(rng.string(2, false))).collect()),
    );
    put("resizing integer array", ints(&mut rng, 1_000, &r32, &r56, false));
    put(
        "negative resizing integer array",
        ints(&mut rng, 1_000, &r32, &r56, true),
    );
    put(
        "unsigned 8-bit defined integer array",
        ints(&mut rng, 1_000, &zero, &BigInt::from(255), false),
    );
    for (label, lo, hi) in [
        ("16", 8, 16),
        ("24", 16, 24),
        ("32", 24, 32),
        ("64", 56, 64),
    ] {
        let (lo, hi) = r(lo, hi);
        put(
            &format!("unsigned {}-bit defined integer array", label),
            ints(&mut rng, 1_000, &lo, &hi, false),
        );
        put(
            &format!("negative {}-bit defined integer array", label),
            ints(&mut rng, 1_000, &lo, &hi, true),
        );
    }
    put(
        "negative 8-bit defined integer array",
        ints(&mut rng, 1_000, &one, &BigInt::from(255), true),
    );
    put(
        "big integer array",
        ints(&mut rng, 20, &pow2(2040), &upper, false),
    );
    put(
        "negative big integer array",
        ints(&mut rng, 20, &pow2(2040), &upper, true),
    );
    put(
        "decimal array",
        Value::Array(
            (0..100)
                .map(|_| {
                    let sign = if rng.bool() { "-" } else { "" };
                    let whole = rng.below(1_000_000);
                    decimal(&format!("{}{}.{}", sign, whole, rng.digits(40)))
                })
                .collect(),
        ),
    );

    let mut everything: Vec<Value> = m.values().cloned().collect();
    everything.push(Value::Array(everything.clone()));
    m.insert("multi-type array 3".to_string(), Value::Array(everything));
    let copy = Value::Object(m.clone());
    m.insert("object 4".to_string(), copy);
    m
}

fn round_trip(original: &Value, options: &WriteOptions) -> Document {
    let bytes = encode(original, options, &[]).expect("encode");
    let doc = Document::open(bytes, &[], ReadOptions::default()).expect("open");
    let decoded = doc.materialize().expect("materialize");
    assert!(decoded.ordered_eq(original), "round trip changed the value");
    doc
}

#[test]
fn every_member_round_trips_as_a_root() {
    let corpus = corpus(0x5EED_0001);
    for (key, member) in &corpus {
        for mode in [StringMapMode::SizeOptimized, StringMapMode::AccessOptimized] {
            let options = WriteOptions {
                mode,
                ..WriteOptions::default()
            };
            let bytes = encode(member, &options, &[]).expect("encode");
            let doc = Document::open(bytes, &[], ReadOptions::default()).expect("open");
            let decoded = doc.materialize().expect("materialize");
            assert!(decoded.ordered_eq(member), "member '{}' changed", key);
        }
    }
}

#[test]
fn whole_corpus_round_trips_and_keeps_its_tags() {
    let original = Value::Object(corpus(0x5EED_0002));
    let doc = round_trip(&original, &WriteOptions::default());

    let expected = [
        ("null", TAG_NULL),
        ("string 0", TAG_STRING),
        ("resizing integer 1", TAG_POS_RESIZING),
        ("negative resizing integer 2", TAG_NEG_RESIZING),
        ("unsigned 8-bit defined integer 2", TAG_POS_U8),
        ("unsigned 24-bit defined integer", TAG_POS_U8 + 2),
        ("negative 64-bit defined integer", TAG_NEG_U8 + 4),
        ("big integer", TAG_POS_BIG),
        ("decimal 3", TAG_DECIMAL),
        ("object 2", TAG_OBJECT),
        ("multi-type array 1", TAG_MULTI_ARRAY),
        ("multi-type array 2", TAG_MULTI_ARRAY),
        ("null array 2", TAG_NULL_ARRAY),
        ("bool array 5", TAG_BOOL_ARRAY),
        ("string array 2", TAG_STRING_ARRAY),
        ("negative resizing integer array", TAG_NEG_RESIZING_ARRAY),
        ("unsigned 32-bit defined integer array", TAG_POS_U8_ARRAY + 3),
        ("negative 16-bit defined integer array", TAG_NEG_U8_ARRAY + 1),
        ("big integer array", TAG_POS_BIG_ARRAY),
        ("negative big integer array", TAG_NEG_BIG_ARRAY),
        ("decimal array", TAG_DECIMAL_ARRAY),
        ("multi-type array 3", TAG_MULTI_ARRAY),
    ];
    for (key, tag) in expected {
        assert_eq!(
            doc.tag_at(&Path::root().key(key)).unwrap(),
            tag,
            "tag of '{}'",
            key
        );
    }

    let inner = doc
        .get(&Path::root().key("object 4").key("bool array 5"))
        .unwrap();
    assert_eq!(inner, original.as_object().unwrap()["bool array 5"]);
}

#[test]
fn json_text_survives_the_container() {
    let original = Value::Object(corpus(0x5EED_0003));
    let text = serde_json::to_string(&original.to_json().unwrap()).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let value = Value::from_json(&parsed).unwrap();
    assert!(value.ordered_eq(&original));

    let doc = round_trip(&value, &WriteOptions::default());
    let back = serde_json::to_string(&doc.materialize().unwrap().to_json().unwrap()).unwrap();
    assert_eq!(back, text);
}
