//! Unified-diff rendering for merge previews.
//!
//! Output is for humans reviewing a change before it is merged. It is never
//! parsed back or applied.

/// Largest `old_lines * new_lines` product a preview is computed for. The
/// edit script keeps a full table of that many cells.
pub const MAX_DIFF_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// One step of the edit script. `old` and `new` count the lines of each side
/// consumed before this step.
#[derive(Debug, Clone, Copy)]
struct Edit {
    kind: EditKind,
    old: usize,
    new: usize,
}

fn edit_script(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let (n, m) = (a.len(), b.len());
    // lcs[i][j] = longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        let kind = if i < n && j < m && a[i] == b[j] {
            EditKind::Equal
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            EditKind::Delete
        } else {
            EditKind::Insert
        };
        edits.push(Edit { kind, old: i, new: j });
        match kind {
            EditKind::Equal => {
                i += 1;
                j += 1;
            }
            EditKind::Delete => i += 1,
            EditKind::Insert => j += 1,
        }
    }
    edits
}

/// Group the edit script into hunks: `[start, end)` ranges over `edits`,
/// each padded with up to `context` unchanged lines. Changes separated by at
/// most `2 * context` unchanged lines share a hunk.
fn hunk_ranges(edits: &[Edit], context: usize) -> Vec<(usize, usize)> {
    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind != EditKind::Equal)
        .map(|(idx, _)| idx)
        .collect();

    let mut ranges = Vec::new();
    let Some((&first, rest)) = changes.split_first() else {
        return ranges;
    };
    let mut start = first.saturating_sub(context);
    let mut last = first;
    for &idx in rest {
        if idx - last - 1 > 2 * context {
            ranges.push((start, (last + context + 1).min(edits.len())));
            start = idx - context;
        }
        last = idx;
    }
    ranges.push((start, (last + context + 1).min(edits.len())));
    ranges
}

fn range_header(start: usize, len: usize) -> String {
    if len == 0 {
        format!("{start},0")
    } else {
        format!("{},{len}", start + 1)
    }
}

/// Render `old` → `new` as a unified diff, or `None` when the texts have the
/// same lines or are too large to preview.
pub fn unified_diff(
    old: &str,
    new: &str,
    old_label: &str,
    new_label: &str,
    context: usize,
) -> Option<String> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    if a == b {
        return None;
    }
    let cells = (a.len() + 1).saturating_mul(b.len() + 1);
    if cells > MAX_DIFF_CELLS {
        tracing::warn!(
            old_lines = a.len(),
            new_lines = b.len(),
            label = new_label,
            "skipping diff preview: input too large"
        );
        return None;
    }

    let edits = edit_script(&a, &b);
    let mut out = format!("--- {old_label}\n+++ {new_label}\n");
    for (start, end) in hunk_ranges(&edits, context) {
        let hunk = &edits[start..end];
        let old_len = hunk.iter().filter(|e| e.kind != EditKind::Insert).count();
        let new_len = hunk.iter().filter(|e| e.kind != EditKind::Delete).count();
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            range_header(hunk[0].old, old_len),
            range_header(hunk[0].new, new_len)
        ));
        for edit in hunk {
            let (prefix, line) = match edit.kind {
                EditKind::Equal => (' ', a[edit.old]),
                EditKind::Delete => ('-', a[edit.old]),
                EditKind::Insert => ('+', b[edit.new]),
            };
            out.push(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    Some(out)
}
