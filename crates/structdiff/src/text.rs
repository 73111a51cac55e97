//! Sequence diff: Myers O(ND) difference algorithm.
//!
//! The algorithm runs over slices of any comparable token type, so the same
//! engine serves plain string fields (one token per `char`) and
//! portable-text blocks (one token per character, mark boundary, or inline
//! object). Each token is an indivisible unit: an edit segment never splits
//! one.
//!
//! All string length/position values are in Unicode scalar values (Rust
//! `char`s), not bytes.

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpType {
    Del = -1,
    Eql = 0,
    Ins = 1,
}

/// A run of tokens sharing one edit type.
pub type TokenOperation<T> = (PatchOpType, Vec<T>);
pub type TokenPatch<T> = Vec<TokenOperation<T>>;

pub type PatchOperation = (PatchOpType, String);
pub type Patch = Vec<PatchOperation>;

// ── Public utilities ──────────────────────────────────────────────────────

/// Compute the diff between two token sequences.
///
/// Returns maximal runs: no two adjacent operations share a type, and no
/// operation is empty. EQL operations are included for context.
pub fn diff_tokens<T: PartialEq + Clone>(src: &[T], dst: &[T]) -> TokenPatch<T> {
    diff_internal(src, dst)
}

/// Compute the character diff between `src` and `dst` strings.
pub fn diff_str(src: &str, dst: &str) -> Patch {
    if src == dst {
        return if src.is_empty() {
            vec![]
        } else {
            vec![(PatchOpType::Eql, src.to_string())]
        };
    }
    let c_src: Vec<char> = src.chars().collect();
    let c_dst: Vec<char> = dst.chars().collect();
    diff_tokens(&c_src, &c_dst)
        .into_iter()
        .map(|(op, chars)| (op, chars.into_iter().collect()))
        .collect()
}

/// Number of tokens in the common prefix of `c1` and `c2`.
pub fn common_prefix<T: PartialEq>(c1: &[T], c2: &[T]) -> usize {
    if c1.is_empty() || c2.is_empty() || c1[0] != c2[0] {
        return 0;
    }
    let mut min = 0usize;
    let mut max = c1.len().min(c2.len());
    let mut mid = max;
    let mut start = 0;
    while min < mid {
        if c1[start..mid] == c2[start..mid] {
            min = mid;
            start = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

/// Number of tokens in the common suffix of `c1` and `c2`.
pub fn common_suffix<T: PartialEq>(c1: &[T], c2: &[T]) -> usize {
    let n1 = c1.len();
    let n2 = c2.len();
    if n1 == 0 || n2 == 0 || c1[n1 - 1] != c2[n2 - 1] {
        return 0;
    }
    let mut min = 0usize;
    let mut max = n1.min(n2);
    let mut mid = max;
    let mut end = 0;
    while min < mid {
        if c1[n1 - mid..n1 - end] == c2[n2 - mid..n2 - end] {
            min = mid;
            end = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

/// Find the first occurrence of `needle` in `haystack`, returning the starting index.
fn find_slice<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn push_op<T: Clone>(patch: &mut TokenPatch<T>, op: PatchOpType, tokens: &[T]) {
    if !tokens.is_empty() {
        patch.push((op, tokens.to_vec()));
    }
}

// ── Core diff algorithm ───────────────────────────────────────────────────

fn diff_internal<T: PartialEq + Clone>(src: &[T], dst: &[T]) -> TokenPatch<T> {
    if src == dst {
        return if src.is_empty() {
            vec![]
        } else {
            vec![(PatchOpType::Eql, src.to_vec())]
        };
    }

    // Strip common prefix
    let prefix_len = common_prefix(src, dst);
    let prefix = &src[..prefix_len];
    let c_src = &src[prefix_len..];
    let c_dst = &dst[prefix_len..];

    // Strip common suffix
    let suffix_len = common_suffix(c_src, c_dst);
    let suffix = &c_src[c_src.len() - suffix_len..];
    let c_src = &c_src[..c_src.len() - suffix_len];
    let c_dst = &c_dst[..c_dst.len() - suffix_len];

    // Compute diff on the middle block
    let mut result = Vec::new();
    push_op(&mut result, PatchOpType::Eql, prefix);
    result.extend(diff_no_common_affix(c_src, c_dst));
    push_op(&mut result, PatchOpType::Eql, suffix);

    cleanup_merge(&mut result);
    result
}

fn diff_no_common_affix<T: PartialEq + Clone>(c1: &[T], c2: &[T]) -> TokenPatch<T> {
    if c1.is_empty() {
        return if c2.is_empty() {
            vec![]
        } else {
            vec![(PatchOpType::Ins, c2.to_vec())]
        };
    }
    if c2.is_empty() {
        return vec![(PatchOpType::Del, c1.to_vec())];
    }

    // Check if shorter is contained in longer
    let (long, short, long_is_src) = if c1.len() > c2.len() {
        (c1, c2, true)
    } else {
        (c2, c1, false)
    };
    if let Some(idx) = find_slice(long, short) {
        let edge = if long_is_src {
            PatchOpType::Del
        } else {
            PatchOpType::Ins
        };
        let mut patch = vec![];
        push_op(&mut patch, edge, &long[..idx]);
        push_op(&mut patch, PatchOpType::Eql, short);
        push_op(&mut patch, edge, &long[idx + short.len()..]);
        return patch;
    }

    if short.len() == 1 {
        return vec![
            (PatchOpType::Del, c1.to_vec()),
            (PatchOpType::Ins, c2.to_vec()),
        ];
    }

    bisect(c1, c2)
}

fn bisect<T: PartialEq + Clone>(c1: &[T], c2: &[T]) -> TokenPatch<T> {
    let n1 = c1.len();
    let n2 = c2.len();
    let max_d = (n1 + n2).div_ceil(2) + 1;
    let v_offset = max_d;
    let v_length = 2 * max_d;

    let mut v1: Vec<i64> = vec![-1; v_length];
    let mut v2: Vec<i64> = vec![-1; v_length];
    v1[v_offset + 1] = 0;
    v2[v_offset + 1] = 0;

    let delta = n1 as i64 - n2 as i64;
    let front = delta % 2 != 0;

    let mut k1start = 0i64;
    let mut k1end = 0i64;
    let mut k2start = 0i64;
    let mut k2end = 0i64;

    for d in 0..max_d as i64 {
        // Forward path
        let mut k1 = -d + k1start;
        while k1 <= d - k1end {
            let k1_offset = (v_offset as i64 + k1) as usize;
            let mut x1: i64 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n1 as i64 && y1 < n2 as i64 && c1[x1 as usize] == c2[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;
            if x1 > n1 as i64 {
                k1end += 2;
            } else if y1 > n2 as i64 {
                k1start += 2;
            } else if front {
                let k2_offset = (v_offset as i64 + delta - k1) as usize;
                if k2_offset < v_length && v2[k2_offset] != -1 && x1 >= n1 as i64 - v2[k2_offset] {
                    return bisect_split(c1, c2, x1 as usize, y1 as usize);
                }
            }
            k1 += 2;
        }

        // Reverse path
        let mut k2 = -d + k2start;
        while k2 <= d - k2end {
            let k2_offset = (v_offset as i64 + k2) as usize;
            let mut x2: i64 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n1 as i64
                && y2 < n2 as i64
                && c1[n1 - 1 - x2 as usize] == c2[n2 - 1 - y2 as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;
            if x2 > n1 as i64 {
                k2end += 2;
            } else if y2 > n2 as i64 {
                k2start += 2;
            } else if !front {
                let k1_offset = (v_offset as i64 + delta - k2) as usize;
                if k1_offset < v_length {
                    let x1 = v1[k1_offset];
                    if x1 != -1 {
                        let y1 = v_offset as i64 + x1 - k1_offset as i64;
                        let x2_real = n1 as i64 - x2;
                        if x1 >= x2_real {
                            return bisect_split(c1, c2, x1 as usize, y1 as usize);
                        }
                    }
                }
            }
            k2 += 2;
        }
    }

    // No split found, so delete all of c1 and insert all of c2
    vec![
        (PatchOpType::Del, c1.to_vec()),
        (PatchOpType::Ins, c2.to_vec()),
    ]
}

fn bisect_split<T: PartialEq + Clone>(c1: &[T], c2: &[T], x: usize, y: usize) -> TokenPatch<T> {
    let mut result = diff_internal(&c1[..x], &c2[..y]);
    result.extend(diff_internal(&c1[x..], &c2[y..]));
    result
}

// ── cleanup_merge ─────────────────────────────────────────────────────────

/// Reorder and merge like edit sections, and factor out common affixes of
/// adjacent delete/insert pairs. Leaves no empty operations behind.
pub(crate) fn cleanup_merge<T: PartialEq + Clone>(diff: &mut TokenPatch<T>) {
    diff.push((PatchOpType::Eql, Vec::new()));
    let mut pointer = 0usize;
    let mut del_cnt = 0usize;
    let mut ins_cnt = 0usize;
    let mut del_txt: Vec<T> = Vec::new();
    let mut ins_txt: Vec<T> = Vec::new();

    while pointer < diff.len() {
        // Remove empty ops that are not the last
        if pointer < diff.len() - 1 && diff[pointer].1.is_empty() {
            diff.remove(pointer);
            continue;
        }

        match diff[pointer].0 {
            PatchOpType::Ins => {
                ins_cnt += 1;
                ins_txt.extend_from_slice(&diff[pointer].1);
                pointer += 1;
            }
            PatchOpType::Del => {
                del_cnt += 1;
                del_txt.extend_from_slice(&diff[pointer].1);
                pointer += 1;
            }
            PatchOpType::Eql => {
                let prev_eq: Option<usize> = {
                    let p = pointer as i64 - ins_cnt as i64 - del_cnt as i64 - 1;
                    if p >= 0 {
                        Some(p as usize)
                    } else {
                        None
                    }
                };

                // Handle accumulated del/ins before this equality
                if del_cnt + ins_cnt > 0 {
                    if !del_txt.is_empty() && !ins_txt.is_empty() {
                        // Factor out common prefix
                        let common = common_prefix(&ins_txt, &del_txt);
                        if common > 0 {
                            let prefix: Vec<T> = ins_txt[..common].to_vec();
                            match prev_eq {
                                Some(pq) if diff[pq].0 == PatchOpType::Eql => {
                                    diff[pq].1.extend(prefix)
                                }
                                _ => {
                                    diff.insert(0, (PatchOpType::Eql, prefix));
                                    pointer += 1;
                                }
                            }
                            ins_txt.drain(..common);
                            del_txt.drain(..common);
                        }

                        // Factor out common suffix
                        let common = common_suffix(&ins_txt, &del_txt);
                        if common > 0 {
                            let ins_len = ins_txt.len();
                            let mut merged: Vec<T> = ins_txt[ins_len - common..].to_vec();
                            merged.extend_from_slice(&diff[pointer].1);
                            diff[pointer].1 = merged;
                            ins_txt.truncate(ins_len - common);
                            let del_len = del_txt.len();
                            del_txt.truncate(del_len - common);
                        }
                    }

                    // Splice replacement
                    let n = ins_cnt + del_cnt;
                    let start = pointer - n;
                    let mut replacement: TokenPatch<T> = Vec::with_capacity(2);
                    if !del_txt.is_empty() {
                        replacement.push((PatchOpType::Del, std::mem::take(&mut del_txt)));
                    }
                    if !ins_txt.is_empty() {
                        replacement.push((PatchOpType::Ins, std::mem::take(&mut ins_txt)));
                    }
                    let added = replacement.len();
                    let _ = diff.splice(start..pointer, replacement);
                    pointer = start + added;
                }

                // Merge this equality with the previous one if it's also EQL
                if pointer != 0 && diff[pointer - 1].0 == PatchOpType::Eql {
                    let cur = std::mem::take(&mut diff[pointer].1);
                    diff[pointer - 1].1.extend(cur);
                    diff.remove(pointer);
                } else {
                    pointer += 1;
                }

                ins_cnt = 0;
                del_cnt = 0;
                del_txt.clear();
                ins_txt.clear();
            }
        }
    }

    // Remove the dummy entry at the end
    if diff.last().map(|(_, s)| s.is_empty()) == Some(true) {
        diff.pop();
    }

    // Second pass: shift single edits sideways to eliminate equalities
    let mut changes = false;
    let mut pointer = 1usize;
    while pointer + 1 < diff.len() {
        let prev_type = diff[pointer - 1].0;
        let next_type = diff[pointer + 1].0;
        if prev_type == PatchOpType::Eql && next_type == PatchOpType::Eql {
            let prev = diff[pointer - 1].1.clone();
            let cur = diff[pointer].1.clone();
            let next = diff[pointer + 1].1.clone();

            if cur.len() >= prev.len() && cur[cur.len() - prev.len()..] == prev[..] {
                // Shift edit over previous equality
                let mut new_cur = prev.clone();
                new_cur.extend_from_slice(&cur[..cur.len() - prev.len()]);
                let mut new_next = prev;
                new_next.extend(next);
                diff[pointer].1 = new_cur;
                diff[pointer + 1].1 = new_next;
                diff.remove(pointer - 1);
                changes = true;
            } else if cur.len() >= next.len() && cur[..next.len()] == next[..] {
                // Shift edit over next equality
                let mut new_prev = prev;
                new_prev.extend_from_slice(&next);
                let mut new_cur = cur[next.len()..].to_vec();
                new_cur.extend(next);
                diff[pointer - 1].1 = new_prev;
                diff[pointer].1 = new_cur;
                diff.remove(pointer + 1);
                changes = true;
                pointer += 1;
            } else {
                pointer += 1;
            }
        } else {
            pointer += 1;
        }
    }

    if changes {
        cleanup_merge(diff);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
