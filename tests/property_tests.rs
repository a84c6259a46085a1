//! Randomized checks for pushback, record boundaries and character reads
//! over arbitrary raw read chunking.

mod common;

use common::{Scripted, Step};
use iolike::*;
use proptest::prelude::*;

/// Split `bytes` into raw reads of the given sizes, cycling through them.
fn chunked(bytes: &[u8], sizes: &[usize]) -> Scripted {
    let mut steps = Vec::new();
    let mut rest = bytes;
    for size in sizes.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at((*size).min(rest.len()));
        steps.push(Step::Data(head.to_vec()));
        rest = tail;
    }
    Scripted::reader(steps)
}

fn chunk_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..9, 1..12)
}

proptest! {
    #[test]
    fn pushback_is_read_first(
        data in prop::collection::vec(any::<u8>(), 1..256),
        pushed in prop::collection::vec(any::<u8>(), 1..32),
        split in any::<prop::sample::Index>(),
        sizes in chunk_sizes(),
    ) {
        let k = split.index(data.len());
        let mut stream = Stream::new(chunked(&data, &sizes));
        stream.binmode().unwrap();

        if k > 0 {
            prop_assert_eq!(stream.read_bytes(k).unwrap(), &data[..k]);
        }
        stream.unread(&pushed).unwrap();
        prop_assert_eq!(stream.read_bytes(pushed.len()).unwrap(), pushed);
        let rest = stream.read_all().unwrap();
        prop_assert_eq!(rest, &data[k..]);
    }

    #[test]
    fn record_ends_at_first_separator(
        content in prop::collection::vec(any::<u8>(), 0..128),
        separator in prop::collection::vec(any::<u8>(), 1..4),
        tail in prop::collection::vec(any::<u8>(), 0..64),
        sizes in chunk_sizes(),
    ) {
        let mut head = content.clone();
        head.extend_from_slice(&separator);
        let first = head
            .windows(separator.len())
            .position(|w| w == separator.as_slice());
        prop_assume!(first == Some(content.len()));

        let mut input = head.clone();
        input.extend_from_slice(&tail);
        let mut stream = Stream::new(chunked(&input, &sizes));
        stream.binmode().unwrap();

        let record = stream.gets_with(separator.as_slice()).unwrap().unwrap();
        prop_assert_eq!(record.as_bytes(), head.as_slice());
        prop_assert_eq!(stream.lineno(), 1);
        prop_assert_eq!(stream.read_all().unwrap(), tail);
    }

    #[test]
    fn lines_reassemble_text(
        text in "[a-zé€😀\n]{0,80}",
        limit in 0usize..6,
        sizes in chunk_sizes(),
    ) {
        let mut stream = Stream::new(chunked(text.as_bytes(), &sizes));
        let records = stream.readlines(("\n", limit)).unwrap();
        let mut joined = Vec::new();
        for record in &records {
            prop_assert!(record.is_valid());
            prop_assert!(!record.is_empty());
            joined.extend_from_slice(record.as_bytes());
        }
        prop_assert_eq!(joined, text.as_bytes());
        prop_assert_eq!(stream.lineno(), records.len() as u64);
    }

    #[test]
    fn chars_are_whole(text in "\\PC{0,40}", sizes in chunk_sizes()) {
        let mut stream = Stream::new(chunked(text.as_bytes(), &sizes));
        let chars: Vec<String> = stream
            .each_char()
            .map(|ch| ch.map(|c| c.to_string()))
            .collect::<Result<_>>()
            .unwrap();
        let expected: Vec<String> = text.chars().map(String::from).collect();
        prop_assert_eq!(chars, expected);
    }
}
