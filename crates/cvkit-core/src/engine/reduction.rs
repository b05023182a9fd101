use super::error::EngineError;

/// One node of a reduction tree, handed to the combining closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Zero for nodes whose items are leaves.
    pub level: usize,
    /// Position of the node within its level.
    pub index: usize,
    /// Position of the node's first item within its level's item list.
    pub offset: usize,
    pub is_root: bool,
    pub items: Vec<T>,
}

/// Combines `items` through a tree whose nodes have at most `max_arity` children.
///
/// Each level is cut left to right into consecutive chunks of `max_arity` items (the
/// last one may be shorter), and every chunk is combined into one item of the next
/// level. Once a level fits in a single node, that node is combined as the root. A
/// list that already fits is combined directly as a level-zero root.
pub fn reduce_in_chunks<T, E, F>(items: Vec<T>, max_arity: usize, mut combine: F) -> Result<T, E>
where
    F: FnMut(Chunk<T>) -> Result<T, E>,
    E: From<EngineError>,
{
    if max_arity < 2 {
        return Err(EngineError::ArityExceeded {
            count: 2,
            max: max_arity,
        }
        .into());
    }

    let mut level = 0;
    let mut current = items;
    while current.len() > max_arity {
        let mut next = Vec::with_capacity(current.len().div_ceil(max_arity));
        let mut remaining = current.into_iter().peekable();
        let mut offset = 0;
        while remaining.peek().is_some() {
            let items: Vec<T> = remaining.by_ref().take(max_arity).collect();
            let size = items.len();
            next.push(combine(Chunk {
                level,
                index: next.len(),
                offset,
                is_root: false,
                items,
            })?);
            offset += size;
        }
        current = next;
        level += 1;
    }

    combine(Chunk {
        level,
        index: 0,
        offset: 0,
        is_root: true,
        items: current,
    })
}
