use std::fmt;

#[derive(Debug, Clone)]
enum Segment {
    Index(usize),
    Key(String),
}

/// Location inside a value graph, rendered as `$`, `$[0]`, `$.key`.
#[derive(Debug, Default, Clone)]
pub(crate) struct ValuePath {
    segments: Vec<Segment>,
}

impl ValuePath {
    pub(crate) fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    pub(crate) fn push_key(&mut self, key: &str) {
        self.segments.push(Segment::Key(key.to_string()));
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => write!(f, ".{key}")?,
            }
        }
        Ok(())
    }
}
