//! The executable format understood by the loader.
//!
//! ```text
//! file header     magic: u16 | nsections: u16 | entry: u32
//! section header  name: [u8; 8] | vaddr: u32 | size: u32 | flags: u32 | offset: u32
//! section data    raw bytes at `offset`, absent for bss
//! ```
//!
//! Integers are little-endian and every section starts on a page boundary.
use sysdefs::constants::machine_const::{COFF_MAGIC, PAGE_SIZE};
use thiserror::Error;

pub const STYP_TEXT: u32 = 0x0020;
pub const STYP_DATA: u32 = 0x0040;
pub const STYP_BSS: u32 = 0x0080;
pub const STYP_RDATA: u32 = 0x0100;

const FILE_HEADER_LEN: usize = 8;
const SECTION_HEADER_LEN: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoffError {
    #[error("executable truncated: needed {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("bad magic number {0:#06x}")]
    BadMagic(u16),

    #[error("section {name} is not page aligned (vaddr {vaddr:#x})")]
    Misaligned { name: String, vaddr: u32 },

    #[error("section {name} data lies outside the file")]
    SectionOutOfBounds { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffSection {
    name: String,
    first_vpn: usize,
    size: usize,
    flags: u32,
    data: Vec<u8>,
}

impl CoffSection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_vpn(&self) -> usize {
        self.first_vpn
    }

    /// Pages the section occupies once loaded.
    pub fn num_pages(&self) -> usize {
        (self.size + PAGE_SIZE - 1) / PAGE_SIZE
    }

    pub fn is_read_only(&self) -> bool {
        self.flags & (STYP_TEXT | STYP_RDATA) != 0
    }

    pub fn is_bss(&self) -> bool {
        self.flags & STYP_BSS != 0
    }

    /// Contents of page `spn` of this section, zero padded to a full page.
    pub fn page_bytes(&self, spn: usize) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        let start = spn * PAGE_SIZE;
        if start < self.data.len() {
            let end = self.data.len().min(start + PAGE_SIZE);
            page[..end - start].copy_from_slice(&self.data[start..end]);
        }
        page
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coff {
    entry_point: u32,
    sections: Vec<CoffSection>,
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn need(bytes: &[u8], needed: usize) -> Result<(), CoffError> {
    if bytes.len() < needed {
        return Err(CoffError::Truncated {
            needed,
            have: bytes.len(),
        });
    }
    Ok(())
}

impl Coff {
    pub fn parse(bytes: &[u8]) -> Result<Coff, CoffError> {
        need(bytes, FILE_HEADER_LEN)?;
        let magic = read_u16(bytes, 0);
        if magic != COFF_MAGIC {
            return Err(CoffError::BadMagic(magic));
        }
        let nsections = read_u16(bytes, 2) as usize;
        let entry_point = read_u32(bytes, 4);
        need(bytes, FILE_HEADER_LEN + nsections * SECTION_HEADER_LEN)?;

        let mut sections = Vec::with_capacity(nsections);
        for s in 0..nsections {
            let at = FILE_HEADER_LEN + s * SECTION_HEADER_LEN;
            let raw_name = &bytes[at..at + 8];
            let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&raw_name[..name_len]).into_owned();
            let vaddr = read_u32(bytes, at + 8);
            let size = read_u32(bytes, at + 12) as usize;
            let flags = read_u32(bytes, at + 16);
            let offset = read_u32(bytes, at + 20) as usize;

            if vaddr as usize % PAGE_SIZE != 0 {
                return Err(CoffError::Misaligned { name, vaddr });
            }
            let data = if flags & STYP_BSS != 0 {
                Vec::new()
            } else {
                match bytes.get(offset..offset + size) {
                    Some(data) => data.to_vec(),
                    None => return Err(CoffError::SectionOutOfBounds { name }),
                }
            };
            sections.push(CoffSection {
                name,
                first_vpn: vaddr as usize / PAGE_SIZE,
                size,
                flags,
                data,
            });
        }
        Ok(Coff {
            entry_point,
            sections,
        })
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, s: usize) -> &CoffSection {
        &self.sections[s]
    }

    pub fn sections(&self) -> &[CoffSection] {
        &self.sections
    }
}

struct PendingSection {
    name: String,
    vpn: usize,
    size: usize,
    flags: u32,
    data: Vec<u8>,
}

/// Produces executable images. Sections added with [`section`](Self::section)
/// are laid out back to back from page 0.
pub struct CoffBuilder {
    entry_point: u32,
    next_vpn: usize,
    sections: Vec<PendingSection>,
}

impl CoffBuilder {
    pub fn new(entry_point: u32) -> Self {
        CoffBuilder {
            entry_point,
            next_vpn: 0,
            sections: Vec::new(),
        }
    }

    pub fn section(self, name: &str, flags: u32, data: &[u8]) -> Self {
        let vpn = self.next_vpn;
        self.section_at(name, vpn, flags, data)
    }

    pub fn bss(self, name: &str, size: usize) -> Self {
        let vpn = self.next_vpn;
        let mut builder = self.section_at(name, vpn, STYP_BSS, &[]);
        if let Some(last) = builder.sections.last_mut() {
            last.size = size;
        }
        builder.next_vpn = vpn + (size + PAGE_SIZE - 1) / PAGE_SIZE;
        builder
    }

    /// Place a section at an explicit page.
    pub fn section_at(mut self, name: &str, vpn: usize, flags: u32, data: &[u8]) -> Self {
        let size = data.len().max(1);
        self.sections.push(PendingSection {
            name: name.chars().take(8).collect(),
            vpn,
            size,
            flags,
            data: data.to_vec(),
        });
        self.next_vpn = vpn + (size + PAGE_SIZE - 1) / PAGE_SIZE;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let headers_len = FILE_HEADER_LEN + self.sections.len() * SECTION_HEADER_LEN;
        let mut image = Vec::with_capacity(headers_len);
        image.extend_from_slice(&COFF_MAGIC.to_le_bytes());
        image.extend_from_slice(&(self.sections.len() as u16).to_le_bytes());
        image.extend_from_slice(&self.entry_point.to_le_bytes());

        let mut offset = headers_len;
        for section in &self.sections {
            let mut name = [0u8; 8];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());
            image.extend_from_slice(&name);
            image.extend_from_slice(&((section.vpn * PAGE_SIZE) as u32).to_le_bytes());
            image.extend_from_slice(&(section.size as u32).to_le_bytes());
            image.extend_from_slice(&section.flags.to_le_bytes());
            let data_offset = if section.flags & STYP_BSS != 0 { 0 } else { offset };
            image.extend_from_slice(&(data_offset as u32).to_le_bytes());
            if section.flags & STYP_BSS == 0 {
                offset += section.size;
            }
        }
        for section in &self.sections {
            if section.flags & STYP_BSS == 0 {
                image.extend_from_slice(&section.data);
                image.resize(image.len() + section.size - section.data.len(), 0);
            }
        }
        image
    }
}
