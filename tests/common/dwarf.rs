//! Hand-encoded DWARF 4.
//!
//! Each unit gets a compile_unit DIE covering `[low, low+len)` (or a range
//! list), subprograms in the shapes compilers emit, and one line program
//! with a single file.

use std::collections::HashMap;

/// Abbreviation codes
const CU: u8 = 1;
const SUBPROGRAM: u8 = 2;
const SPECIFIED: u8 = 3;
const DECLARATION: u8 = 4;
const SUBPROGRAM_ABSOLUTE: u8 = 5;
const NAMELESS: u8 = 6;
const SUBPROGRAM_RANGES: u8 = 7;
const CU_RANGES: u8 = 8;
const SPECIFIED_GLOBAL: u8 = 9;

/// Range list offset no `.debug_ranges` section reaches
const DANGLING_RANGES: u32 = 0x00ff_0000;

/// How the compile_unit DIE describes its code
#[derive(Debug, Clone)]
pub enum UnitCode {
    /// `DW_AT_low_pc` + constant `DW_AT_high_pc`
    Contiguous,
    /// `DW_AT_ranges` with these absolute `[begin, end)` pairs
    Ranges(Vec<(u64, u64)>),
    /// `DW_AT_ranges` pointing past the end of `.debug_ranges`
    Dangling,
}

#[derive(Debug, Clone)]
pub struct Sequence {
    /// `(address, line)` rows in address order
    pub rows: Vec<(u64, u32)>,
    /// Address of the end_sequence row
    pub end: u64,
}

#[derive(Debug, Clone)]
pub struct DwarfUnit {
    pub name: String,
    pub comp_dir: String,
    pub low: u64,
    pub len: u32,
    /// `(name, low, len)` subprograms with a direct DW_AT_name
    pub functions: Vec<(String, u64, u32)>,
    /// `(name, low, len)` subprograms named through a declaration
    pub specified: Vec<(String, u64, u32)>,
    /// `(name, low, high)` subprograms with an address-class high_pc
    pub absolute: Vec<(String, u64, u64)>,
    /// `(low, len)` subprograms without any name attribute
    pub nameless: Vec<(u64, u32)>,
    /// Subprograms described by a range list of absolute `[begin, end)`
    pub ranged: Vec<(String, Vec<(u64, u64)>)>,
    /// Declarations other units refer to with `DW_FORM_ref_addr`
    pub declarations: Vec<String>,
    /// `(name, low, len)` subprograms whose declaration is in an earlier unit
    pub defined_elsewhere: Vec<(String, u64, u32)>,
    pub code: UnitCode,
    pub directory: String,
    pub file: String,
    pub sequences: Vec<Sequence>,
    /// Listed in `.debug_aranges`
    pub in_aranges: bool,
}

impl DwarfUnit {
    pub fn new(name: &str, low: u64, len: u32) -> Self {
        Self {
            name: name.to_string(),
            comp_dir: "/build".to_string(),
            low,
            len,
            functions: Vec::new(),
            specified: Vec::new(),
            absolute: Vec::new(),
            nameless: Vec::new(),
            ranged: Vec::new(),
            declarations: Vec::new(),
            defined_elsewhere: Vec::new(),
            code: UnitCode::Contiguous,
            directory: "/src".to_string(),
            file: name.to_string(),
            sequences: Vec::new(),
            in_aranges: true,
        }
    }

    pub fn function(mut self, name: &str, low: u64, len: u32) -> Self {
        self.functions.push((name.to_string(), low, len));
        self
    }

    pub fn specified(mut self, name: &str, low: u64, len: u32) -> Self {
        self.specified.push((name.to_string(), low, len));
        self
    }

    pub fn absolute(mut self, name: &str, low: u64, high: u64) -> Self {
        self.absolute.push((name.to_string(), low, high));
        self
    }

    pub fn nameless(mut self, low: u64, len: u32) -> Self {
        self.nameless.push((low, len));
        self
    }

    pub fn ranged(mut self, name: &str, ranges: &[(u64, u64)]) -> Self {
        self.ranged.push((name.to_string(), ranges.to_vec()));
        self
    }

    pub fn declaration(mut self, name: &str) -> Self {
        self.declarations.push(name.to_string());
        self
    }

    pub fn defined_elsewhere(mut self, name: &str, low: u64, len: u32) -> Self {
        self.defined_elsewhere.push((name.to_string(), low, len));
        self
    }

    /// Describe the unit's code with a range list instead of low/high.
    pub fn code_ranges(mut self, ranges: &[(u64, u64)]) -> Self {
        self.code = UnitCode::Ranges(ranges.to_vec());
        self
    }

    /// Give the unit a `DW_AT_ranges` whose list cannot be read.
    pub fn dangling_ranges(mut self) -> Self {
        self.code = UnitCode::Dangling;
        self
    }

    pub fn directory(mut self, directory: &str) -> Self {
        self.directory = directory.to_string();
        self
    }

    pub fn sequence(mut self, rows: &[(u64, u32)], end: u64) -> Self {
        self.sequences.push(Sequence {
            rows: rows.to_vec(),
            end,
        });
        self
    }

    pub fn without_arange(mut self) -> Self {
        self.in_aranges = false;
        self
    }
}

/// Contents of the `.debug_*` sections
#[derive(Debug, Clone, Default)]
pub struct DwarfSections {
    pub abbrev: Vec<u8>,
    pub info: Vec<u8>,
    pub line: Vec<u8>,
    pub aranges: Option<Vec<u8>>,
    pub ranges: Option<Vec<u8>>,
}

fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn sleb(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn addr(out: &mut Vec<u8>, address_size: u8, value: u64) {
    if address_size == 8 {
        out.extend_from_slice(&value.to_le_bytes());
    } else {
        out.extend_from_slice(&(value as u32).to_le_bytes());
    }
}

fn patch_length(out: &mut [u8], start: usize) {
    let len = (out.len() - start - 4) as u32;
    out[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

fn abbrevs() -> Vec<u8> {
    let mut out = Vec::new();
    let mut abbrev = |code: u8, tag: u8, children: bool, attrs: &[(u8, u8)]| {
        out.extend_from_slice(&[code, tag, u8::from(children)]);
        for &(at, form) in attrs {
            out.extend_from_slice(&[at, form]);
        }
        out.extend_from_slice(&[0, 0]);
    };
    // DW_AT_name/string, comp_dir/string, low_pc/addr, high_pc/data4, stmt_list/sec_offset
    abbrev(CU, 0x11, true, &[(0x03, 0x08), (0x1b, 0x08), (0x11, 0x01), (0x12, 0x06), (0x10, 0x17)]);
    abbrev(SUBPROGRAM, 0x2e, false, &[(0x03, 0x08), (0x11, 0x01), (0x12, 0x06)]);
    // DW_AT_specification/ref4
    abbrev(SPECIFIED, 0x2e, false, &[(0x47, 0x13), (0x11, 0x01), (0x12, 0x06)]);
    // DW_AT_declaration/flag_present
    abbrev(DECLARATION, 0x2e, false, &[(0x03, 0x08), (0x3c, 0x19)]);
    // DW_AT_high_pc/addr
    abbrev(SUBPROGRAM_ABSOLUTE, 0x2e, false, &[(0x03, 0x08), (0x11, 0x01), (0x12, 0x01)]);
    abbrev(NAMELESS, 0x2e, false, &[(0x11, 0x01), (0x12, 0x06)]);
    // DW_AT_ranges/sec_offset
    abbrev(SUBPROGRAM_RANGES, 0x2e, false, &[(0x03, 0x08), (0x55, 0x17)]);
    abbrev(CU_RANGES, 0x11, true, &[(0x03, 0x08), (0x1b, 0x08), (0x11, 0x01), (0x10, 0x17), (0x55, 0x17)]);
    // DW_AT_specification/ref_addr
    abbrev(SPECIFIED_GLOBAL, 0x2e, false, &[(0x47, 0x10), (0x11, 0x01), (0x12, 0x06)]);
    out.push(0);
    out
}

fn line_program(out: &mut Vec<u8>, unit: &DwarfUnit, address_size: u8) {
    let start = out.len();
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&4u16.to_le_bytes());
    let header_length_at = out.len();
    out.extend_from_slice(&[0; 4]);
    let header_start = out.len();

    // min_inst_length, max_ops, default_is_stmt, line_base -5, line_range 14, opcode_base 13
    out.extend_from_slice(&[1, 1, 1, 0xFB, 14, 13]);
    out.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
    cstr(out, &unit.directory);
    out.push(0);
    cstr(out, &unit.file);
    uleb(out, 1);
    uleb(out, 0);
    uleb(out, 0);
    out.push(0);

    let header_length = (out.len() - header_start) as u32;
    out[header_length_at..header_length_at + 4].copy_from_slice(&header_length.to_le_bytes());

    for sequence in &unit.sequences {
        let Some(&(first, _)) = sequence.rows.first() else {
            continue;
        };
        // DW_LNE_set_address
        out.push(0);
        uleb(out, 1 + address_size as u64);
        out.push(0x02);
        addr(out, address_size, first);

        let mut address = first;
        let mut line = 1i64;
        for &(row_address, row_line) in &sequence.rows {
            if row_address != address {
                out.push(0x02);
                uleb(out, row_address - address);
                address = row_address;
            }
            if row_line as i64 != line {
                out.push(0x03);
                sleb(out, row_line as i64 - line);
                line = row_line as i64;
            }
            out.push(0x01);
        }

        out.push(0x02);
        uleb(out, sequence.end - address);
        // DW_LNE_end_sequence
        out.extend_from_slice(&[0, 1, 1]);
    }

    patch_length(out, start);
}

/// Append a `.debug_ranges` list relative to `base`; returns its offset.
fn range_list(out: &mut Vec<u8>, address_size: u8, base: u64, ranges: &[(u64, u64)]) -> u32 {
    let offset = out.len() as u32;
    for &(begin, end) in ranges {
        addr(out, address_size, begin - base);
        addr(out, address_size, end - base);
    }
    addr(out, address_size, 0);
    addr(out, address_size, 0);
    offset
}

/// Encode `units` with the given address size (4 for PE32, 8 for PE32+).
///
/// A `defined_elsewhere` name must be declared by an earlier unit.
pub fn encode(units: &[DwarfUnit], address_size: u8) -> DwarfSections {
    let mut info = Vec::new();
    let mut line = Vec::new();
    let mut aranges = Vec::new();
    let mut ranges = Vec::new();
    let mut declared: HashMap<String, u32> = HashMap::new();

    for unit in units {
        let unit_start = info.len();
        let stmt_list = line.len() as u32;
        line_program(&mut line, unit, address_size);

        info.extend_from_slice(&[0; 4]);
        info.extend_from_slice(&4u16.to_le_bytes());
        info.extend_from_slice(&0u32.to_le_bytes());
        info.push(address_size);

        // Base address of the unit's range lists
        let (abbrev, base) = match unit.code {
            UnitCode::Contiguous => (CU, unit.low),
            UnitCode::Ranges(_) | UnitCode::Dangling => (CU_RANGES, 0),
        };
        info.push(abbrev);
        cstr(&mut info, &unit.name);
        cstr(&mut info, &unit.comp_dir);
        addr(&mut info, address_size, base);
        match &unit.code {
            UnitCode::Contiguous => {
                info.extend_from_slice(&unit.len.to_le_bytes());
                info.extend_from_slice(&stmt_list.to_le_bytes());
            }
            UnitCode::Ranges(list) => {
                info.extend_from_slice(&stmt_list.to_le_bytes());
                let offset = range_list(&mut ranges, address_size, 0, list);
                info.extend_from_slice(&offset.to_le_bytes());
            }
            UnitCode::Dangling => {
                info.extend_from_slice(&stmt_list.to_le_bytes());
                info.extend_from_slice(&DANGLING_RANGES.to_le_bytes());
            }
        }

        for (name, low, len) in &unit.functions {
            info.push(SUBPROGRAM);
            cstr(&mut info, name);
            addr(&mut info, address_size, *low);
            info.extend_from_slice(&len.to_le_bytes());
        }
        for (name, low, len) in &unit.specified {
            let declaration = (info.len() - unit_start) as u32;
            info.push(DECLARATION);
            cstr(&mut info, name);

            info.push(SPECIFIED);
            info.extend_from_slice(&declaration.to_le_bytes());
            addr(&mut info, address_size, *low);
            info.extend_from_slice(&len.to_le_bytes());
        }
        for (name, low, high) in &unit.absolute {
            info.push(SUBPROGRAM_ABSOLUTE);
            cstr(&mut info, name);
            addr(&mut info, address_size, *low);
            addr(&mut info, address_size, *high);
        }
        for (low, len) in &unit.nameless {
            info.push(NAMELESS);
            addr(&mut info, address_size, *low);
            info.extend_from_slice(&len.to_le_bytes());
        }
        for (name, list) in &unit.ranged {
            info.push(SUBPROGRAM_RANGES);
            cstr(&mut info, name);
            let offset = range_list(&mut ranges, address_size, base, list);
            info.extend_from_slice(&offset.to_le_bytes());
        }
        for name in &unit.declarations {
            declared.insert(name.clone(), info.len() as u32);
            info.push(DECLARATION);
            cstr(&mut info, name);
        }
        for (name, low, len) in &unit.defined_elsewhere {
            let declaration = declared[name];
            info.push(SPECIFIED_GLOBAL);
            info.extend_from_slice(&declaration.to_le_bytes());
            addr(&mut info, address_size, *low);
            info.extend_from_slice(&len.to_le_bytes());
        }
        info.push(0);
        patch_length(&mut info, unit_start);

        if unit.in_aranges {
            let start = aranges.len();
            aranges.extend_from_slice(&[0; 4]);
            aranges.extend_from_slice(&2u16.to_le_bytes());
            aranges.extend_from_slice(&(unit_start as u32).to_le_bytes());
            aranges.push(address_size);
            aranges.push(0);
            // Tuples start at a multiple of the tuple size
            let tuple = 2 * address_size as usize;
            while (aranges.len() - start) % tuple != 0 {
                aranges.push(0);
            }
            addr(&mut aranges, address_size, unit.low);
            addr(&mut aranges, address_size, unit.len as u64);
            addr(&mut aranges, address_size, 0);
            addr(&mut aranges, address_size, 0);
            patch_length(&mut aranges, start);
        }
    }

    DwarfSections {
        abbrev: abbrevs(),
        info,
        line,
        aranges: (!aranges.is_empty()).then_some(aranges),
        ranges: (!ranges.is_empty()).then_some(ranges),
    }
}
