//! Lazy iteration over bytes, characters, codepoints and records
//!
//! Each iterator borrows the stream mutably and reads one element per
//! `next` call. The end of data ends the iteration. An error is yielded
//! once and ends the iteration too. Dropping an iterator early leaves the
//! stream right after the last element it produced.

use std::iter::FusedIterator;

use super::encoding::Text;
use super::error::{Error, Result};
use super::primitive::Primitive;
use super::record::RecordOptions;
use super::stream::Stream;

fn step<T>(done: &mut bool, read: Result<T>) -> Option<Result<T>> {
    if *done {
        return None;
    }
    match read {
        Ok(item) => Some(Ok(item)),
        Err(Error::EndOfData) => {
            *done = true;
            None
        }
        Err(err) => {
            *done = true;
            Some(Err(err))
        }
    }
}

/// Iterator over bytes, from [`Stream::each_byte`].
#[derive(Debug)]
pub struct Bytes<'a, P: Primitive> {
    stream: &'a mut Stream<P>,
    done: bool,
}

impl<P: Primitive> Iterator for Bytes<'_, P> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let read = self.stream.readbyte();
        step(&mut self.done, read)
    }
}

impl<P: Primitive> FusedIterator for Bytes<'_, P> {}

/// Iterator over characters, from [`Stream::each_char`].
#[derive(Debug)]
pub struct Chars<'a, P: Primitive> {
    stream: &'a mut Stream<P>,
    done: bool,
}

impl<P: Primitive> Iterator for Chars<'_, P> {
    type Item = Result<Text>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let read = self.stream.readchar();
        step(&mut self.done, read)
    }
}

impl<P: Primitive> FusedIterator for Chars<'_, P> {}

/// Iterator over codepoints, from [`Stream::each_codepoint`].
#[derive(Debug)]
pub struct Codepoints<'a, P: Primitive> {
    stream: &'a mut Stream<P>,
    done: bool,
}

impl<P: Primitive> Iterator for Codepoints<'_, P> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let read = self.stream.readcodepoint();
        step(&mut self.done, read)
    }
}

impl<P: Primitive> FusedIterator for Codepoints<'_, P> {}

/// Iterator over records, from [`Stream::each_line`].
#[derive(Debug)]
pub struct Lines<'a, P: Primitive> {
    stream: &'a mut Stream<P>,
    options: RecordOptions,
    done: bool,
}

impl<P: Primitive> Iterator for Lines<'_, P> {
    type Item = Result<Text>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let read = self.stream.next_record(&self.options);
        step(&mut self.done, read)
    }
}

impl<P: Primitive> FusedIterator for Lines<'_, P> {}

impl<P: Primitive> Stream<P> {
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"abc"[..]));
    /// let first_two: Vec<u8> = stream.each_byte().take(2).map(Result::unwrap).collect();
    /// assert_eq!(first_two, b"ab");
    /// // The next pass sees only what is left.
    /// assert_eq!(stream.each_byte().count(), 1);
    /// ```
    pub fn each_byte(&mut self) -> Bytes<'_, P> {
        Bytes {
            stream: self,
            done: false,
        }
    }

    /// Characters until the end of data.
    pub fn each_char(&mut self) -> Chars<'_, P> {
        Chars {
            stream: self,
            done: false,
        }
    }

    /// Codepoints until the end of data.
    pub fn each_codepoint(&mut self) -> Codepoints<'_, P> {
        Codepoints {
            stream: self,
            done: false,
        }
    }

    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, RecordOptions, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"a,b,c"[..]));
    /// let fields: Vec<String> = stream
    ///     .each_line(",")
    ///     .map(|field| field.unwrap().to_string())
    ///     .collect();
    /// assert_eq!(fields, ["a,", "b,", "c"]);
    /// ```
    pub fn each_line<O: Into<RecordOptions>>(&mut self, options: O) -> Lines<'_, P> {
        Lines {
            stream: self,
            options: options.into(),
            done: false,
        }
    }
}
