//! End-to-end encode/decode coverage: wire vectors, round trips across
//! matching and mismatched shapes, and the error surface.

use std::collections::{BTreeMap, HashMap};

use malachite::Integer;
use rtl::{decode, marshal, unmarshal, Encodable, RtlError, RtlValue, ValueReader};

fn enc<T: Encodable + ?Sized>(v: &T) -> Vec<u8> {
    marshal(v).unwrap().to_vec()
}

fn roundtrip<T>(v: &T) -> T
where
    T: Encodable + rtl::Decodable,
{
    unmarshal::<T>(&enc(v)).unwrap()
}

#[test]
fn wire_vectors() {
    assert_eq!(enc(&142_857u64), [0xA3, 0x02, 0x2E, 0xC9]);
    assert_eq!(enc("dog"), [0xC3, 0x64, 0x6F, 0x67]);
    assert_eq!(enc(&vec![1i64, 4, 2, 8, 5, 7]), [0x96, 1, 4, 2, 8, 5, 7]);
    assert_eq!(enc(&true), [0x81]);
    assert_eq!(enc(&false), [0x80]);
    assert_eq!(enc(&-1i64), [0xA9, 0x01]);
}

#[test]
fn sentinel_stability() {
    assert_eq!(enc(&None::<Vec<u8>>), [0x80]);
    assert_eq!(enc(&None::<HashMap<u64, u64>>), [0x80]);
    assert_eq!(enc(&None::<Box<u64>>), [0x80]);
    assert_eq!(enc(&Vec::<u8>::new()), [0x82]);
    assert_eq!(enc(&Vec::<String>::new()), [0x82]);
}

#[test]
fn primitive_roundtrips() {
    assert_eq!(roundtrip(&142_857i64), 142_857);
    assert_eq!(roundtrip(&0u8), 0);
    assert_eq!(roundtrip(&127u8), 127);
    assert_eq!(roundtrip(&128u16), 128);
    assert_eq!(roundtrip(&-128i16), -128);
    assert_eq!(roundtrip(&u64::MAX), u64::MAX);
    assert_eq!(roundtrip(&i64::MIN), i64::MIN);
    assert_eq!(roundtrip(&i64::MAX), i64::MAX);
    assert_eq!(roundtrip(&true), true);
    assert_eq!(roundtrip(&false), false);
    assert_eq!(roundtrip(&111.3f32), 111.3);
    assert_eq!(roundtrip(&34_343_434.333f64), 34_343_434.333);
    assert_eq!(roundtrip(&-2.5f64), -2.5);
    assert_eq!(roundtrip(&String::from("dog")), "dog");
    assert_eq!(roundtrip(&String::new()), "");
}

#[test]
fn sequence_roundtrips() {
    assert_eq!(roundtrip(&vec![1u64, 4, 2, 8, 5, 7]), vec![1, 4, 2, 8, 5, 7]);
    assert_eq!(roundtrip(&Vec::<u64>::new()), Vec::<u64>::new());
    assert_eq!(roundtrip(&vec![0x7Fu8]), vec![0x7F]);
    assert_eq!(roundtrip(&vec![0x80u8]), vec![0x80]);
    assert_eq!(roundtrip(&vec![1u8, 2, 3]), vec![1, 2, 3]);
    let strings: Vec<String> = (0..15).map(|i| format!("s{i:02}")).collect();
    assert_eq!(roundtrip(&strings), strings);
    let nested: Vec<Vec<String>> =
        (0..32).map(|_| vec!["asdf".into(), "qwer".into(), "zxcv".into()]).collect();
    assert_eq!(roundtrip(&nested), nested);
    let arr = [3u64, 0, 9];
    assert_eq!(roundtrip(&arr), arr);
    let bytes: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
    assert_eq!(roundtrip(&bytes), bytes);
}

#[test]
fn map_roundtrips() {
    let mut hm = HashMap::new();
    hm.insert("key1".to_string(), 1i64);
    hm.insert("key2".to_string(), 2i64);
    assert_eq!(roundtrip(&hm), hm);

    let mut bm = BTreeMap::new();
    bm.insert(1i64, Some("string1".to_string()));
    bm.insert(2i64, Some("string2".to_string()));
    bm.insert(3i64, None);
    assert_eq!(roundtrip(&bm), bm);

    assert_eq!(roundtrip(&HashMap::<u64, u64>::new()), HashMap::new());
}

#[test]
fn option_and_box_roundtrips() {
    assert_eq!(roundtrip(&Some(5u64)), Some(5));
    assert_eq!(roundtrip(&None::<u64>), None);
    assert_eq!(roundtrip(&Some("x".to_string())), Some("x".to_string()));
    assert_eq!(roundtrip(&Box::new(77u64)), Box::new(77));
    assert_eq!(roundtrip(&Some(Box::new(-9i64))), Some(Box::new(-9)));
    assert_eq!(
        roundtrip(&Some(vec![1u64, 2, 3])),
        Some(vec![1, 2, 3])
    );
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Embedded {
        a: u64,
        b: u64,
        c: String,
        d: Vec<u8>,
    }
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Basic {
        a: u64,
        b: u64,
        c: String,
        e: i64,
        f: Option<Integer>,
        g: Embedded,
    }
}

#[test]
fn nested_record_roundtrip() {
    let obj = Basic {
        a: 22,
        b: 33,
        c: "basic object".into(),
        e: -983,
        f: Some(Integer::from(9_999_999u32)),
        g: Embedded {
            a: 44,
            b: 55,
            c: "embedded object".into(),
            d: b"byte slice".to_vec(),
        },
    };
    assert_eq!(roundtrip(&obj), obj);
    assert_eq!(roundtrip(&Basic::default()), Basic::default());
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct SimpleRecord {
        a: u64,
        b: String,
    }
}

#[test]
fn record_wire_form() {
    let v = SimpleRecord { a: 3, b: "foo".into() };
    assert_eq!(enc(&v), [0x92, 0x03, 0xC3, 0x66, 0x6F, 0x6F]);
    // A record with every field zero still emits its field-count array:
    // the integer zero is the inline byte, the empty string is Zero.
    assert_eq!(enc(&SimpleRecord::default()), [0x92, 0x00, 0x80]);
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct RecStruct {
        i: u64,
        child: Option<Box<RecStruct>>,
    }
}

#[test]
fn recursive_records_through_pointers() {
    let v = RecStruct {
        i: 5,
        child: Some(Box::new(RecStruct {
            i: 4,
            child: Some(Box::new(RecStruct { i: 3, child: None })),
        })),
    };
    assert_eq!(roundtrip(&v), v);
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct ByteSource {
        a: Vec<u8>,
        b: Vec<u8>,
    }
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct TextDest {
        c: String,
        d: Vec<i64>,
    }
}

#[test]
fn cross_shape_decoding() {
    // Byte payloads decode into strings and element-wise into numeric
    // sequences; record interop is purely positional.
    let src = ByteSource {
        a: b"a string".to_vec(),
        b: vec![0x1, 0x2, 0x3, 0x4],
    };
    let dst: TextDest = unmarshal(&enc(&src)).unwrap();
    assert_eq!(dst.c, "a string");
    assert_eq!(dst.d, vec![1, 2, 3, 4]);
}

#[test]
fn string_and_bytes_interchange() {
    assert_eq!(unmarshal::<Vec<u8>>(&enc("dog")).unwrap(), b"dog".to_vec());
    assert_eq!(unmarshal::<String>(&enc(&b"dog".to_vec())).unwrap(), "dog");
    // A byte payload decodes element-wise into a fixed non-byte array,
    // zero-filling the tail.
    assert_eq!(
        unmarshal::<[u16; 5]>(&enc(&vec![9u8, 8, 7])).unwrap(),
        [9, 8, 7, 0, 0]
    );
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct OrderedSource {
        a: u64,
        b: u64,
        c: String,
        d: Vec<u8>,
    }
}

rtl::rtl_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct OrderedDest {
        #[rtl(order = 4)]
        e: Option<Integer>,
        #[rtl(order = 5)]
        f: i64,
        #[rtl(order = 2)]
        c: String,
        #[rtl(order = 1)]
        b: u64,
    }
}

#[test]
fn explicit_orders_align_across_types() {
    let src = OrderedSource {
        a: 1,
        b: 2,
        c: "Charlie".into(),
        d: b"not in".to_vec(),
    };
    let dst: OrderedDest = unmarshal(&enc(&src)).unwrap();
    // Field A (order 0) is skipped, B and C land, D is passed over, and the
    // fields beyond the data stay zero.
    assert_eq!(dst.b, 2);
    assert_eq!(dst.c, "Charlie");
    assert_eq!(dst.e, None);
    assert_eq!(dst.f, 0);
}

#[test]
fn shorter_destination_skips_trailing_fields() {
    let src = OrderedSource {
        a: 1,
        b: 2,
        c: "x".into(),
        d: vec![5, 6],
    };
    let dst: SimpleRecord = unmarshal(&enc(&src)).unwrap();
    assert_eq!(dst.a, 1);
    assert_eq!(dst.b, "\u{2}"); // positional: B's integer 2 lands in a string
}

#[test]
fn fixed_array_tolerates_length_mismatch() {
    // Encoded six elements into a three-element destination: extras skipped.
    let six = vec![1u64, 2, 3, 4, 5, 6];
    assert_eq!(unmarshal::<[u64; 3]>(&enc(&six)).unwrap(), [1, 2, 3]);
    // Encoded two elements into a four-element destination: tail zeroed.
    let two = vec![7u64, 8];
    assert_eq!(unmarshal::<[u64; 4]>(&enc(&two)).unwrap(), [7, 8, 0, 0]);
    // The stream must stay aligned after the skip.
    let pair = (six, 42u64);
    let mut bytes = enc(&pair.0);
    bytes.extend_from_slice(&enc(&pair.1));
    let mut r = ValueReader::from_slice(&bytes);
    assert_eq!(decode::<[u64; 3], _>(&mut r).unwrap(), [1, 2, 3]);
    assert_eq!(decode::<u64, _>(&mut r).unwrap(), 42);
}

#[test]
fn multiple_values_from_one_reader() {
    let mut bytes = enc(&5u64);
    bytes.extend_from_slice(&enc("hi"));
    bytes.extend_from_slice(&enc(&vec![1u8, 2]));
    let mut r = ValueReader::from_slice(&bytes);
    assert_eq!(decode::<u64, _>(&mut r).unwrap(), 5);
    assert_eq!(decode::<String, _>(&mut r).unwrap(), "hi");
    assert_eq!(decode::<Vec<u8>, _>(&mut r).unwrap(), vec![1, 2]);
    assert!(decode::<u64, _>(&mut r).is_err());
}

#[test]
fn skip_is_byte_exact() {
    let obj = Basic {
        a: 1,
        b: 200,
        c: "skip me".into(),
        e: -5,
        f: Some(rtl::priors::bytes_to_integer(&[0x11; 13], false)),
        g: Embedded {
            a: 9,
            b: 0,
            c: String::new(),
            d: vec![0xFF; 40],
        },
    };
    let bytes = enc(&obj);
    let mut r = ValueReader::from_slice(&bytes);
    assert_eq!(r.skip().unwrap(), bytes.len());

    let strings: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    let bytes = enc(&strings);
    let mut r = ValueReader::from_slice(&bytes);
    assert_eq!(r.skip().unwrap(), bytes.len());
}

#[test]
fn boundary_forms() {
    // Array: 16 single, 17 multi.
    let v16: Vec<u64> = vec![1; 16];
    assert_eq!(enc(&v16)[0], 0x90);
    let v17: Vec<u64> = vec![1; 17];
    assert_eq!(&enc(&v17)[..2], &[0x89, 17]);
    // String: 32 single, 33 multi.
    let s32 = "a".repeat(32);
    assert_eq!(enc(s32.as_str())[0], 0xC0);
    let s33 = "a".repeat(33);
    assert_eq!(&enc(s33.as_str())[..2], &[0xE1, 33]);
    // Numeric: 127 inline, 128 one magnitude byte.
    assert_eq!(enc(&127u64), [0x7F]);
    assert_eq!(enc(&128u64), [0xA1, 0x80]);
    for (v, decoded) in [(s32, 32usize), (s33, 33usize)] {
        assert_eq!(unmarshal::<String>(&enc(v.as_str())).unwrap().len(), decoded);
    }
    assert_eq!(roundtrip(&v17), v17);
}

#[test]
fn dynamic_values_encode_and_decode() {
    let v = RtlValue::List(vec![
        RtlValue::Uint(1),
        RtlValue::Str("two".into()),
        RtlValue::Int(-3),
        RtlValue::List(vec![RtlValue::Null]),
    ]);
    assert_eq!(roundtrip(&v), v);
    // Maps encode (order is the encoder's) but decode as their flattened
    // list form only when the destination asks for a concrete map.
    let m = RtlValue::Map(vec![(RtlValue::Uint(1), RtlValue::Uint(2))]);
    let bytes = enc(&m);
    assert_eq!(bytes, [0x92, 1, 2]);
    assert_eq!(
        unmarshal::<HashMap<u64, u64>>(&bytes).unwrap(),
        HashMap::from([(1, 2)])
    );
}

#[test]
fn decode_error_surface() {
    // Unassigned header byte.
    assert!(matches!(
        unmarshal::<u64>(&[0x83]),
        Err(RtlError::UnsupportedHeader(0x83))
    ));
    // Destination kind rejects the header.
    assert!(matches!(
        unmarshal::<bool>(&enc("dog")),
        Err(RtlError::TypeMismatch { .. })
    ));
    assert!(matches!(
        unmarshal::<u64>(&enc(&true)),
        Err(RtlError::TypeMismatch { .. })
    ));
    // Negative into unsigned.
    assert!(matches!(
        unmarshal::<u64>(&enc(&-1i64)),
        Err(RtlError::SignMismatch(_))
    ));
    // Width overflow.
    assert!(matches!(
        unmarshal::<u8>(&enc(&300u64)),
        Err(RtlError::NumericOverflow(_))
    ));
    assert!(matches!(
        unmarshal::<i64>(&enc(&u64::MAX)),
        Err(RtlError::NumericOverflow(_))
    ));
    // Truncated input.
    assert!(matches!(
        unmarshal::<String>(&[0xC3, b'd']),
        Err(RtlError::Eof)
    ));
    assert!(matches!(unmarshal::<u64>(&[]), Err(RtlError::Eof)));
    // Odd-length array into a map.
    assert!(matches!(
        unmarshal::<HashMap<u64, u64>>(&[0x93, 1, 2, 3]),
        Err(RtlError::OddMapLength(3))
    ));
    // Empty sentinel into a record.
    assert!(matches!(
        unmarshal::<SimpleRecord>(&[0x82]),
        Err(RtlError::TypeMismatch { .. })
    ));
}

#[test]
fn hostile_nesting_is_bounded() {
    // 101 nested single-element arrays.
    let mut bytes = vec![0x91u8; 101];
    bytes.push(0x00);
    assert!(matches!(
        unmarshal::<RtlValue>(&bytes),
        Err(RtlError::NestingOverflow)
    ));
    // 40 levels decode fine.
    let mut bytes = vec![0x91u8; 40];
    bytes.push(0x00);
    assert!(unmarshal::<RtlValue>(&bytes).is_ok());
}

#[test]
fn zero_decodes_into_everything() {
    assert_eq!(unmarshal::<u64>(&[0x80]).unwrap(), 0);
    assert_eq!(unmarshal::<i32>(&[0x80]).unwrap(), 0);
    assert_eq!(unmarshal::<f64>(&[0x80]).unwrap(), 0.0);
    assert!(!unmarshal::<bool>(&[0x80]).unwrap());
    assert_eq!(unmarshal::<String>(&[0x80]).unwrap(), "");
    assert_eq!(unmarshal::<Vec<u8>>(&[0x80]).unwrap(), Vec::<u8>::new());
    assert_eq!(unmarshal::<Option<u64>>(&[0x80]).unwrap(), None);
    assert_eq!(unmarshal::<HashMap<u64, u64>>(&[0x80]).unwrap(), HashMap::new());
    assert_eq!(unmarshal::<SimpleRecord>(&[0x80]).unwrap(), SimpleRecord::default());
    assert_eq!(unmarshal::<[u32; 2]>(&[0x80]).unwrap(), [0, 0]);
    assert_eq!(unmarshal::<RtlValue>(&[0x80]).unwrap(), RtlValue::Null);
}

#[test]
fn declared_limit_rejects_runaway_counts() {
    // A multi-header claiming far more elements than the buffer holds.
    let bytes = [0x8B, 0x00, 0x0F, 0x42, 0x40];
    assert!(matches!(
        unmarshal::<Vec<u64>>(&bytes),
        Err(RtlError::LengthOverflow(_))
    ));
}
