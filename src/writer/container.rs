//! The binary grammar container (spec §4.5, §6): file header, stream
//! directory, and the tables stream's present-table bitmap, row counts, row
//! sizes, and packed rows.

use crate::buffer::{heap_index_width_for_len, index_width_for_row_count, ByteReader, ByteWriter};
use crate::types::{
  EntityHandle, GramforgeError, GramforgeResult, GroupFlags, GroupId, NonterminalId, ProductionId, TableKind, TokenSymbolFlags, TokenSymbolId,
};

use super::heap::{BlobHeap, HeapHandle, StringHeap};

pub const MAGIC: &[u8; 8] = b"GRMFORGE";
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

const STRING_HEAP_ID: u64 = 1;
const BLOB_HEAP_ID: u64 = 2;
const TABLES_ID: u64 = 3;

const BIT_GRAMMAR: u64 = 1 << 0;
const BIT_TOKEN_SYMBOL: u64 = 1 << 1;
const BIT_GROUP: u64 = 1 << 2;
const BIT_GROUP_NESTING: u64 = 1 << 3;
const BIT_NONTERMINAL: u64 = 1 << 4;
const BIT_PRODUCTION: u64 = 1 << 5;
const BIT_PRODUCTION_MEMBER: u64 = 1 << 6;
const BIT_STATE_MACHINE: u64 = 1 << 7;
const BIT_SPECIAL_NAME: u64 = 1 << 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSymbolRecord {
  pub name:  String,
  pub flags: TokenSymbolFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRecord {
  pub container: TokenSymbolId,
  pub start:     TokenSymbolId,
  pub end:       TokenSymbolId,
  pub flags:     GroupFlags,
  pub nesting:   Vec<GroupId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonterminalRecord {
  pub name:        String,
  pub productions: Vec<ProductionId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductionRecord {
  pub head:    NonterminalId,
  pub members: Vec<EntityHandle>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialNameRecord {
  pub name:   String,
  pub handle: EntityHandle,
}

/// The fully built, self-contained grammar artifact: everything needed to
/// drive a lexer/parser at runtime, with the source `Regex`/precedence data
/// that only mattered at build time already compiled away (spec §4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarImage {
  pub name:          String,
  pub start:         NonterminalId,
  pub token_symbols: Vec<TokenSymbolRecord>,
  pub nonterminals:  Vec<NonterminalRecord>,
  pub productions:   Vec<ProductionRecord>,
  pub groups:        Vec<GroupRecord>,
  pub dfa_blob:      Vec<u8>,
  pub lalr_blob:     Vec<u8>,
  pub is_glr:        bool,
  pub special_names: Vec<SpecialNameRecord>,
}

struct Widths {
  token:       u8,
  nonterminal: u8,
  production:  u8,
  group:       u8,
  nesting_row: u8,
  member_row:  u8,
  string_heap: u8,
  blob_heap:   u8,
}

impl Widths {
  /// The width of a "token-or-nonterminal" coded index: the max of the two
  /// participant tables' own widths (spec §4.5).
  fn entity_width(&self) -> u8 {
    self.token.max(self.nonterminal)
  }
}

fn pack_token_flags(f: &TokenSymbolFlags) -> u8 {
  (f.terminal as u8) | (f.hidden as u8) << 1 | (f.noise as u8) << 2 | (f.group_start as u8) << 3 | (f.generated as u8) << 4
}

fn unpack_token_flags(byte: u8) -> TokenSymbolFlags {
  TokenSymbolFlags {
    terminal:    byte & 1 != 0,
    hidden:      byte & 2 != 0,
    noise:       byte & 4 != 0,
    group_start: byte & 8 != 0,
    generated:   byte & 16 != 0,
  }
}

fn pack_group_flags(f: &GroupFlags) -> u8 {
  (f.advance_by_character as u8) | (f.ends_on_end_of_input as u8) << 1 | (f.keep_end_token as u8) << 2
}

fn unpack_group_flags(byte: u8) -> GroupFlags {
  GroupFlags { advance_by_character: byte & 1 != 0, ends_on_end_of_input: byte & 2 != 0, keep_end_token: byte & 4 != 0 }
}

/// Encodes `image` into a complete grammar container (spec §6 file layout).
pub fn encode(image: &GrammarImage) -> GramforgeResult<Vec<u8>> {
  let mut strings = StringHeap::new();
  let mut blobs = BlobHeap::new();

  let name_handle = strings.intern(&image.name)?;
  let token_names: Vec<HeapHandle> = image.token_symbols.iter().map(|t| strings.intern(&t.name)).collect::<GramforgeResult<_>>()?;
  let nonterminal_names: Vec<HeapHandle> = image.nonterminals.iter().map(|n| strings.intern(&n.name)).collect::<GramforgeResult<_>>()?;
  let special_names: Vec<HeapHandle> = image.special_names.iter().map(|s| strings.intern(&s.name)).collect::<GramforgeResult<_>>()?;
  let dfa_handle = blobs.intern(&image.dfa_blob)?;
  let lalr_handle = blobs.intern(&image.lalr_blob)?;

  let total_members: usize = image.productions.iter().map(|p| p.members.len()).sum();
  let total_nesting: usize = image.groups.iter().map(|g| g.nesting.len()).sum();

  let widths = Widths {
    token:       index_width_for_row_count(image.token_symbols.len()),
    nonterminal: index_width_for_row_count(image.nonterminals.len()),
    production:  index_width_for_row_count(image.productions.len()),
    group:       index_width_for_row_count(image.groups.len()),
    nesting_row: index_width_for_row_count(total_nesting),
    member_row:  index_width_for_row_count(total_members),
    string_heap: heap_index_width_for_len(strings.len()),
    blob_heap:   heap_index_width_for_len(blobs.len()),
  };

  let mut bitmap = BIT_GRAMMAR | BIT_STATE_MACHINE;
  if !image.token_symbols.is_empty() {
    bitmap |= BIT_TOKEN_SYMBOL;
  }
  if !image.groups.is_empty() {
    bitmap |= BIT_GROUP;
  }
  if total_nesting > 0 {
    bitmap |= BIT_GROUP_NESTING;
  }
  if !image.nonterminals.is_empty() {
    bitmap |= BIT_NONTERMINAL;
  }
  if !image.productions.is_empty() {
    bitmap |= BIT_PRODUCTION;
  }
  if total_members > 0 {
    bitmap |= BIT_PRODUCTION_MEMBER;
  }
  if !image.special_names.is_empty() {
    bitmap |= BIT_SPECIAL_NAME;
  }

  let row_count = |bit: u64, n: usize| -> Option<u32> { (bitmap & bit != 0).then_some(n as u32) };
  let row_size = |bit: u64, size: u8| -> Option<u8> { (bitmap & bit != 0).then_some(size) };

  let counts: Vec<u32> = [
    row_count(BIT_GRAMMAR, 1),
    row_count(BIT_TOKEN_SYMBOL, image.token_symbols.len()),
    row_count(BIT_GROUP, image.groups.len()),
    row_count(BIT_GROUP_NESTING, total_nesting),
    row_count(BIT_NONTERMINAL, image.nonterminals.len()),
    row_count(BIT_PRODUCTION, image.productions.len()),
    row_count(BIT_PRODUCTION_MEMBER, total_members),
    row_count(BIT_STATE_MACHINE, 2),
    row_count(BIT_SPECIAL_NAME, image.special_names.len()),
  ]
  .into_iter()
  .flatten()
  .collect();

  let sizes: Vec<u8> = [
    row_size(BIT_GRAMMAR, widths.string_heap + widths.nonterminal + 1),
    row_size(BIT_TOKEN_SYMBOL, widths.string_heap + 1),
    row_size(BIT_GROUP, widths.token * 3 + 1 + 4 + 4),
    row_size(BIT_GROUP_NESTING, widths.group),
    row_size(BIT_NONTERMINAL, widths.string_heap + 4 + 4),
    row_size(BIT_PRODUCTION, widths.nonterminal + 4 + 4),
    row_size(BIT_PRODUCTION_MEMBER, 1 + widths.entity_width()),
    row_size(BIT_STATE_MACHINE, 1 + widths.blob_heap),
    row_size(BIT_SPECIAL_NAME, widths.string_heap + 1 + widths.entity_width()),
  ]
  .into_iter()
  .flatten()
  .collect();

  let mut tables = ByteWriter::new();
  tables.write_u64(bitmap);
  for &c in &counts {
    tables.write_u32(c);
  }
  for &s in &sizes {
    tables.write_u8(s);
  }
  let heap_sizes_byte = (widths.string_heap == 4) as u8 | ((widths.blob_heap == 4) as u8) << 1;
  tables.write_u8(heap_sizes_byte);
  tables.pad_to_alignment(8);

  // Grammar row
  tables.write_index(widths.string_heap, name_handle);
  tables.write_index(widths.nonterminal, image.start.index());
  tables.write_u8(image.is_glr as u8);

  // TokenSymbol rows
  for (t, &name) in image.token_symbols.iter().zip(&token_names) {
    tables.write_index(widths.string_heap, name);
    tables.write_u8(pack_token_flags(&t.flags));
  }

  // Group rows
  let mut nesting_cursor: u32 = 0;
  for g in &image.groups {
    tables.write_index(widths.token, g.container.index());
    tables.write_index(widths.token, g.start.index());
    tables.write_index(widths.token, g.end.index());
    tables.write_u8(pack_group_flags(&g.flags));
    tables.write_u32(nesting_cursor);
    tables.write_u32(g.nesting.len() as u32);
    nesting_cursor += g.nesting.len() as u32;
  }

  // GroupNesting rows
  for g in &image.groups {
    for &nested in &g.nesting {
      tables.write_index(widths.group, nested.index());
    }
  }

  // Nonterminal rows
  let mut production_cursor: u32 = 0;
  for (n, &name) in image.nonterminals.iter().zip(&nonterminal_names) {
    tables.write_index(widths.string_heap, name);
    tables.write_u32(production_cursor);
    tables.write_u32(n.productions.len() as u32);
    production_cursor += n.productions.len() as u32;
  }

  // Production rows
  let mut member_cursor: u32 = 0;
  for p in &image.productions {
    tables.write_index(widths.nonterminal, p.head.index());
    tables.write_u32(member_cursor);
    tables.write_u32(p.members.len() as u32);
    member_cursor += p.members.len() as u32;
  }

  // ProductionMember rows
  for p in &image.productions {
    for m in &p.members {
      let kind = if m.kind == TableKind::TokenSymbol { 0u8 } else { 1u8 };
      tables.write_u8(kind);
      tables.write_index(widths.entity_width(), m.index);
    }
  }

  // StateMachine rows: kind 0 = DFA, kind 1 = LALR/GLR
  tables.write_u8(0);
  tables.write_index(widths.blob_heap, dfa_handle);
  tables.write_u8(1);
  tables.write_index(widths.blob_heap, lalr_handle);

  // SpecialName rows
  for (s, &name) in image.special_names.iter().zip(&special_names) {
    tables.write_index(widths.string_heap, name);
    let kind = if s.handle.kind == TableKind::TokenSymbol { 0u8 } else { 1u8 };
    tables.write_u8(kind);
    tables.write_index(widths.entity_width(), s.handle.index);
  }

  let string_bytes = strings.into_bytes();
  let blob_bytes = blobs.into_bytes();
  let tables_bytes = tables.into_bytes();

  let header_len = 8 + 2 + 2 + 4;
  let directory_len = 3 * 16;
  let string_offset = (header_len + directory_len) as u32;
  let blob_offset = string_offset + string_bytes.len() as u32;
  let tables_offset = blob_offset + blob_bytes.len() as u32;

  let mut out = ByteWriter::new();
  out.write_bytes(MAGIC);
  out.write_u16(VERSION_MAJOR);
  out.write_u16(VERSION_MINOR);
  out.write_u32(3);
  out.write_u64(STRING_HEAP_ID);
  out.write_u32(string_offset);
  out.write_u32(string_bytes.len() as u32);
  out.write_u64(BLOB_HEAP_ID);
  out.write_u32(blob_offset);
  out.write_u32(blob_bytes.len() as u32);
  out.write_u64(TABLES_ID);
  out.write_u32(tables_offset);
  out.write_u32(tables_bytes.len() as u32);
  out.write_bytes(&string_bytes);
  out.write_bytes(&blob_bytes);
  out.write_bytes(&tables_bytes);

  Ok(out.into_bytes())
}

/// Decodes a container produced by [`encode`]. Rejects a `major` version
/// mismatch; tolerates a higher `minor` (spec §6).
pub fn decode(bytes: &[u8]) -> GramforgeResult<GrammarImage> {
  let mut r = ByteReader::new(bytes);
  let magic = r.read_bytes(8)?;
  if magic != MAGIC.as_slice() {
    return Err(GramforgeError::Internal("grammar image magic bytes do not match".into()));
  }
  let major = r.read_u16()?;
  let _minor = r.read_u16()?;
  if major != VERSION_MAJOR {
    return Err(GramforgeError::Internal(format!("unsupported grammar image major version {major}")));
  }
  let stream_count = r.read_u32()?;

  let mut string_range = None;
  let mut blob_range = None;
  let mut tables_range = None;
  for _ in 0..stream_count {
    let id = r.read_u64()?;
    let offset = r.read_u32()? as usize;
    let length = r.read_u32()? as usize;
    match id {
      STRING_HEAP_ID => string_range = Some((offset, length)),
      BLOB_HEAP_ID => blob_range = Some((offset, length)),
      TABLES_ID => tables_range = Some((offset, length)),
      _ => {}
    }
  }
  let (string_off, string_len) = string_range.ok_or_else(|| GramforgeError::Internal("missing string heap stream".into()))?;
  let (blob_off, blob_len) = blob_range.ok_or_else(|| GramforgeError::Internal("missing blob heap stream".into()))?;
  let (tables_off, tables_len) = tables_range.ok_or_else(|| GramforgeError::Internal("missing tables stream".into()))?;

  let string_bytes = &bytes[string_off..string_off + string_len];
  let blob_bytes = &bytes[blob_off..blob_off + blob_len];
  let mut t = ByteReader::new(&bytes[tables_off..tables_off + tables_len]);

  let bitmap = t.read_u64()?;
  let present = |bit: u64| bitmap & bit != 0;

  let mut counts = std::collections::HashMap::new();
  for &bit in &[
    BIT_GRAMMAR,
    BIT_TOKEN_SYMBOL,
    BIT_GROUP,
    BIT_GROUP_NESTING,
    BIT_NONTERMINAL,
    BIT_PRODUCTION,
    BIT_PRODUCTION_MEMBER,
    BIT_STATE_MACHINE,
    BIT_SPECIAL_NAME,
  ] {
    if present(bit) {
      counts.insert(bit, t.read_u32()? as usize);
    }
  }
  let mut sizes = std::collections::HashMap::new();
  for &bit in &[
    BIT_GRAMMAR,
    BIT_TOKEN_SYMBOL,
    BIT_GROUP,
    BIT_GROUP_NESTING,
    BIT_NONTERMINAL,
    BIT_PRODUCTION,
    BIT_PRODUCTION_MEMBER,
    BIT_STATE_MACHINE,
    BIT_SPECIAL_NAME,
  ] {
    if present(bit) {
      sizes.insert(bit, t.read_u8()?);
    }
  }
  let _ = sizes; // row sizes are redundant with the widths recomputed below; kept for format completeness.
  let heap_sizes_byte = t.read_u8()?;
  let string_heap_width = if heap_sizes_byte & 1 != 0 { 4 } else { 2 };
  let blob_heap_width = if heap_sizes_byte & 2 != 0 { 4 } else { 2 };
  t.seek((t.position() + 7) / 8 * 8);

  let token_count = counts.get(&BIT_TOKEN_SYMBOL).copied().unwrap_or(0);
  let group_count = counts.get(&BIT_GROUP).copied().unwrap_or(0);
  let nesting_count = counts.get(&BIT_GROUP_NESTING).copied().unwrap_or(0);
  let nonterminal_count = counts.get(&BIT_NONTERMINAL).copied().unwrap_or(0);
  let production_count = counts.get(&BIT_PRODUCTION).copied().unwrap_or(0);
  let member_count = counts.get(&BIT_PRODUCTION_MEMBER).copied().unwrap_or(0);
  let special_name_count = counts.get(&BIT_SPECIAL_NAME).copied().unwrap_or(0);

  let token_width = index_width_for_row_count(token_count);
  let nonterminal_width = index_width_for_row_count(nonterminal_count);
  let group_width = index_width_for_row_count(group_count);
  let entity_width = token_width.max(nonterminal_width);

  // Grammar row
  let name_handle = t.read_index(string_heap_width)?;
  let name = read_cstring(string_bytes, name_handle as usize)?;
  let start = NonterminalId::new(t.read_index(nonterminal_width)?);
  let is_glr = t.read_u8()? != 0;

  // TokenSymbol rows
  let mut token_symbols = Vec::with_capacity(token_count);
  for _ in 0..token_count {
    let name_handle = t.read_index(string_heap_width)?;
    let flags = unpack_token_flags(t.read_u8()?);
    token_symbols.push(TokenSymbolRecord { name: read_cstring(string_bytes, name_handle as usize)?, flags });
  }

  // Group rows
  struct RawGroup {
    container: u32,
    start: u32,
    end: u32,
    flags: GroupFlags,
    first_nesting: u32,
    nesting_count: u32,
  }
  let mut raw_groups = Vec::with_capacity(group_count);
  for _ in 0..group_count {
    let container = t.read_index(token_width)?;
    let start = t.read_index(token_width)?;
    let end = t.read_index(token_width)?;
    let flags = unpack_group_flags(t.read_u8()?);
    let first_nesting = t.read_u32()?;
    let nesting_count_row = t.read_u32()?;
    raw_groups.push(RawGroup { container, start, end, flags, first_nesting, nesting_count: nesting_count_row });
  }

  // GroupNesting rows
  let mut nested_groups = Vec::with_capacity(nesting_count);
  for _ in 0..nesting_count {
    nested_groups.push(GroupId::new(t.read_index(group_width)?));
  }

  let groups = raw_groups
    .into_iter()
    .map(|g| GroupRecord {
      container: TokenSymbolId::new(g.container),
      start: TokenSymbolId::new(g.start),
      end: TokenSymbolId::new(g.end),
      flags: g.flags,
      nesting: nested_groups[g.first_nesting as usize..(g.first_nesting + g.nesting_count) as usize].to_vec(),
    })
    .collect();

  // Nonterminal rows
  struct RawNonterminal {
    name: u32,
    first_production: u32,
    production_count: u32,
  }
  let mut raw_nonterminals = Vec::with_capacity(nonterminal_count);
  for _ in 0..nonterminal_count {
    let name = t.read_index(string_heap_width)?;
    let first_production = t.read_u32()?;
    let production_count_row = t.read_u32()?;
    raw_nonterminals.push(RawNonterminal { name, first_production, production_count: production_count_row });
  }

  // Production rows
  struct RawProduction {
    head: u32,
    first_member: u32,
    member_count: u32,
  }
  let mut raw_productions = Vec::with_capacity(production_count);
  for _ in 0..production_count {
    let head = t.read_index(nonterminal_width)?;
    let first_member = t.read_u32()?;
    let member_count_row = t.read_u32()?;
    raw_productions.push(RawProduction { head, first_member, member_count: member_count_row });
  }

  // ProductionMember rows
  let mut members = Vec::with_capacity(member_count);
  for _ in 0..member_count {
    let kind = t.read_u8()?;
    let index = t.read_index(entity_width)?;
    members.push(EntityHandle { kind: if kind == 0 { TableKind::TokenSymbol } else { TableKind::Nonterminal }, index });
  }

  let productions = raw_productions
    .into_iter()
    .map(|p| ProductionRecord {
      head: NonterminalId::new(p.head),
      members: members[p.first_member as usize..(p.first_member + p.member_count) as usize].to_vec(),
    })
    .collect();

  let nonterminals = raw_nonterminals
    .into_iter()
    .map(|n| NonterminalRecord {
      name: read_cstring(string_bytes, n.name as usize).unwrap_or_default(),
      productions: (n.first_production..n.first_production + n.production_count).map(|i| ProductionId::new(i + 1)).collect(),
    })
    .collect();

  // StateMachine rows (always exactly 2: DFA then LALR/GLR, in that order)
  let _dfa_kind = t.read_u8()?;
  let dfa_handle = t.read_index(blob_heap_width)?;
  let _lalr_kind = t.read_u8()?;
  let lalr_handle = t.read_index(blob_heap_width)?;
  let dfa_blob = read_blob(blob_bytes, dfa_handle as usize)?;
  let lalr_blob = read_blob(blob_bytes, lalr_handle as usize)?;

  // SpecialName rows
  let mut special_names = Vec::with_capacity(special_name_count);
  for _ in 0..special_name_count {
    let name_handle = t.read_index(string_heap_width)?;
    let kind = t.read_u8()?;
    let index = t.read_index(entity_width)?;
    special_names.push(SpecialNameRecord {
      name: read_cstring(string_bytes, name_handle as usize)?,
      handle: EntityHandle { kind: if kind == 0 { TableKind::TokenSymbol } else { TableKind::Nonterminal }, index },
    });
  }

  Ok(GrammarImage { name, start, token_symbols, nonterminals, productions, groups, dfa_blob, lalr_blob, is_glr, special_names })
}

fn read_cstring(heap: &[u8], offset: usize) -> GramforgeResult<String> {
  if offset == 0 {
    return Ok(String::new());
  }
  let end = heap[offset..].iter().position(|&b| b == 0).ok_or_else(|| GramforgeError::Internal("unterminated string heap entry".into()))?;
  String::from_utf8(heap[offset..offset + end].to_vec()).map_err(|e| GramforgeError::Internal(format!("invalid UTF-8 in string heap: {e}")))
}

fn read_blob(heap: &[u8], offset: usize) -> GramforgeResult<Vec<u8>> {
  if offset == 0 {
    return Ok(Vec::new());
  }
  let mut r = ByteReader::new(heap);
  r.seek(offset);
  let len = r.read_compressed_length()? as usize;
  Ok(r.read_bytes(len)?.to_vec())
}
