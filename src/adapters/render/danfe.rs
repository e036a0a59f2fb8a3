use crate::adapters::pdf::{
    page_count, page_slice, truncate_to_width, Font, Orientation, Page, PageSize, PdfDocument,
};
use crate::domain::nfe::{NfeDocument, NfeProduct};
use crate::utils::error::{ExportError, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DanfePageFormat {
    #[default]
    A4,
    A5,
}

impl DanfePageFormat {
    pub fn page_size(self) -> PageSize {
        match self {
            DanfePageFormat::A4 => PageSize::A4,
            DanfePageFormat::A5 => PageSize::A5,
        }
    }

    /// Product lines per page.
    pub fn capacity(self) -> usize {
        self.page_size().rows_per_page()
    }

    pub fn as_str(self) -> &'static str {
        self.page_size().as_str()
    }
}

impl FromStr for DanfePageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A4" => Ok(DanfePageFormat::A4),
            "A5" => Ok(DanfePageFormat::A5),
            other => Err(format!(
                "DANFE page format '{}' is not supported. Use A4 or A5.",
                other
            )),
        }
    }
}

/// Column layout of the product table: title and share of the table width.
const PRODUCT_COLUMNS: [(&str, f32); 8] = [
    ("CÓDIGO", 0.10),
    ("DESCRIÇÃO", 0.32),
    ("NCM", 0.09),
    ("CFOP", 0.07),
    ("UN", 0.06),
    ("QTD", 0.10),
    ("V. UNIT", 0.12),
    ("V. TOTAL", 0.14),
];

#[derive(Debug, Clone, Default)]
pub struct DanfeRenderer {
    page_format: DanfePageFormat,
    homologation: bool,
}

impl DanfeRenderer {
    pub fn new(page_format: DanfePageFormat) -> Self {
        Self {
            page_format,
            homologation: false,
        }
    }

    /// Marks every page as issued in the test environment (sem valor fiscal).
    pub fn with_homologation(mut self, homologation: bool) -> Self {
        self.homologation = homologation;
        self
    }

    pub fn page_format(&self) -> DanfePageFormat {
        self.page_format
    }

    pub fn build(&self, nfe: &NfeDocument) -> PdfDocument {
        let capacity = self.page_format.capacity();
        let total_pages = page_count(nfe.products.len(), capacity);
        let mut doc = PdfDocument::new(self.page_format.page_size(), Orientation::Portrait)
            .with_info(format!("DANFE {}", nfe.access_key), nfe.issuer.name.clone());

        for page_index in 0..total_pages {
            let page = doc.add_page();
            let layout = Layout::for_page(page);
            let mut y = self.draw_header(page, &layout, nfe);
            y = draw_parties(page, &layout, y, nfe);
            let products = page_slice(&nfe.products, page_index, capacity);
            y = draw_products(page, &layout, y, products, capacity);
            draw_totals(page, &layout, y, nfe);
            draw_footer(page, &layout, nfe, page_index + 1, total_pages);
        }

        doc
    }

    /// Writes the DANFE and returns the number of pages emitted.
    pub fn render(&self, nfe: &NfeDocument, output_path: &Path) -> Result<usize> {
        if nfe.access_key.is_empty() {
            return Err(ExportError::InvalidNfe {
                message: "NFe has no access key".to_string(),
            });
        }
        let doc = self.build(nfe);
        let bytes = doc.save(output_path)?;
        tracing::info!(
            "🧾 DANFE written: {} ({} pages, {} bytes)",
            output_path.display(),
            doc.page_count(),
            bytes
        );
        Ok(doc.page_count())
    }

    fn draw_header(&self, page: &mut Page, layout: &Layout, nfe: &NfeDocument) -> f32 {
        let top = page.height() - layout.margin;
        let height = 62.0 * layout.scale;
        page.rect(layout.margin, top - height, layout.width, height);

        page.text(
            layout.margin + 6.0,
            top - 18.0 * layout.scale,
            16.0 * layout.scale,
            Font::Bold,
            "DANFE",
        );
        page.text(
            layout.margin + 6.0,
            top - 30.0 * layout.scale,
            layout.small,
            Font::Regular,
            "Documento Auxiliar da Nota Fiscal Eletrônica",
        );

        let right = layout.margin + layout.width * 0.38;
        page.text(right, top - 14.0 * layout.scale, layout.small, Font::Bold, "Chave de Acesso");
        page.text(
            right,
            top - 26.0 * layout.scale,
            layout.normal,
            Font::Regular,
            &format_access_key(&nfe.access_key),
        );
        if let Some(protocol) = &nfe.authorization_protocol {
            page.text(
                right,
                top - 40.0 * layout.scale,
                layout.small,
                Font::Regular,
                &format!("Protocolo de autorização: {}", protocol),
            );
        }
        if let Some(issued_at) = &nfe.issued_at {
            page.text(
                right,
                top - 52.0 * layout.scale,
                layout.small,
                Font::Regular,
                &format!("Emissão: {}", issued_at.format("%d/%m/%Y %H:%M:%S")),
            );
        }
        if self.homologation {
            page.text(
                layout.margin + 6.0,
                top - 52.0 * layout.scale,
                layout.small,
                Font::Bold,
                "SEM VALOR FISCAL",
            );
        }

        top - height - 6.0 * layout.scale
    }
}

struct Layout {
    margin: f32,
    width: f32,
    scale: f32,
    normal: f32,
    small: f32,
}

impl Layout {
    fn for_page(page: &Page) -> Self {
        let scale = page.width() / PageSize::A4.dimensions().0;
        let margin = 28.0 * scale;
        Self {
            margin,
            width: page.width() - 2.0 * margin,
            scale,
            normal: 9.0 * scale,
            small: 7.0 * scale,
        }
    }
}

fn draw_section(page: &mut Page, layout: &Layout, top: f32, title: &str, lines: &[String]) -> f32 {
    let line_height = 11.0 * layout.scale;
    let height = line_height * (lines.len() as f32 + 1.0) + 4.0 * layout.scale;
    page.rect(layout.margin, top - height, layout.width, height);
    page.text(layout.margin + 4.0, top - line_height, layout.small, Font::Bold, title);

    let mut y = top - line_height;
    for line in lines {
        y -= line_height;
        let text = truncate_to_width(line, layout.width - 8.0, layout.normal);
        page.text(layout.margin + 4.0, y, layout.normal, Font::Regular, &text);
    }
    top - height - 4.0 * layout.scale
}

fn draw_parties(page: &mut Page, layout: &Layout, top: f32, nfe: &NfeDocument) -> f32 {
    let issuer = &nfe.issuer;
    let mut y = draw_section(
        page,
        layout,
        top,
        "EMITENTE",
        &[
            issuer.name.clone(),
            format!(
                "CNPJ: {}   IE: {}",
                format_tax_id(&issuer.tax_id),
                issuer.state_registration
            ),
            issuer.address.one_line(),
        ],
    );

    let recipient = &nfe.recipient;
    y = draw_section(
        page,
        layout,
        y,
        "DESTINATÁRIO / REMETENTE",
        &[
            recipient.name.clone(),
            format!(
                "CNPJ/CPF: {}   IE: {}",
                format_tax_id(&recipient.tax_id),
                recipient.state_registration
            ),
            recipient.address.one_line(),
        ],
    );

    if let Some(carrier) = &nfe.carrier {
        y = draw_section(
            page,
            layout,
            y,
            "TRANSPORTADOR / VOLUMES TRANSPORTADOS",
            &[
                format!("{}   CNPJ: {}", carrier.name, format_tax_id(&carrier.tax_id)),
                format!("{} - {}/{}", carrier.address, carrier.city, carrier.state),
            ],
        );
    }
    y
}

fn draw_products(
    page: &mut Page,
    layout: &Layout,
    top: f32,
    products: &[NfeProduct],
    capacity: usize,
) -> f32 {
    let totals_and_footer = 80.0 * layout.scale;
    let available = top - (layout.margin + totals_and_footer);
    let row_height = (available / (capacity + 1) as f32).min(14.0 * layout.scale);
    let size = layout.small;

    let widths: Vec<f32> = PRODUCT_COLUMNS
        .iter()
        .map(|(_, share)| share * layout.width)
        .collect();

    let mut y = top - row_height;
    page.fill_rect(layout.margin, y, layout.width, row_height, 0.85);
    let mut x = layout.margin;
    for ((title, _), width) in PRODUCT_COLUMNS.iter().zip(&widths) {
        page.text(x + 2.0, y + row_height * 0.3, size, Font::Bold, title);
        x += width;
    }

    for product in products {
        y -= row_height;
        let cells = [
            product.code.clone(),
            product.description.clone(),
            product.ncm.clone(),
            product.cfop.clone(),
            product.unit.clone(),
            format_quantity(product.quantity),
            format_money(product.unit_value),
            format_money(product.total_value),
        ];
        let mut x = layout.margin;
        for (cell, width) in cells.iter().zip(&widths) {
            let text = truncate_to_width(cell, width - 4.0, size);
            page.text(x + 2.0, y + row_height * 0.3, size, Font::Regular, &text);
            x += width;
        }
    }

    page.rect(layout.margin, y, layout.width, top - y);
    y - 6.0 * layout.scale
}

fn draw_totals(page: &mut Page, layout: &Layout, top: f32, nfe: &NfeDocument) {
    let totals = &nfe.totals;
    let fields = [
        ("V. PRODUTOS", totals.products),
        ("FRETE", totals.freight),
        ("SEGURO", totals.insurance),
        ("DESCONTO", totals.discount),
        ("IPI", totals.ipi),
        ("V. TOTAL DA NOTA", totals.invoice),
    ];
    let height = 26.0 * layout.scale;
    let cell_width = layout.width / fields.len() as f32;
    page.rect(layout.margin, top - height, layout.width, height);

    for (i, (label, value)) in fields.iter().enumerate() {
        let x = layout.margin + i as f32 * cell_width + 3.0;
        page.text(x, top - 9.0 * layout.scale, layout.small * 0.9, Font::Bold, label);
        page.text(
            x,
            top - 20.0 * layout.scale,
            layout.normal,
            Font::Regular,
            &format_money(*value),
        );
    }

    if let Some(info) = &nfe.additional_info {
        let text = truncate_to_width(
            &format!("Inf. complementares: {}", info),
            layout.width,
            layout.small,
        );
        page.text(
            layout.margin,
            top - height - 10.0 * layout.scale,
            layout.small,
            Font::Regular,
            &text,
        );
    }
}

fn draw_footer(page: &mut Page, layout: &Layout, nfe: &NfeDocument, number: usize, total: usize) {
    let y = layout.margin * 0.6;
    page.text(
        layout.margin,
        y,
        layout.small,
        Font::Regular,
        &format!("NF-e {}", nfe.access_key),
    );
    page.text(
        layout.margin + layout.width - 60.0 * layout.scale,
        y,
        layout.small,
        Font::Regular,
        &format!("Página {} de {}", number, total),
    );
}

/// Access key in groups of four digits.
pub fn format_access_key(key: &str) -> String {
    key.chars()
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// CNPJ as `00.000.000/0000-00`, CPF as `000.000.000-00`, anything else as given.
pub fn format_tax_id(id: &str) -> String {
    let digits: String = id.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        14 => format!(
            "{}.{}.{}/{}-{}",
            &digits[0..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..12],
            &digits[12..14]
        ),
        11 => format!(
            "{}.{}.{}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..11]
        ),
        _ => id.to_string(),
    }
}

/// Brazilian money format: `1.234,56`.
pub fn format_money(value: Decimal) -> String {
    let rounded = format!("{:.2}", value.round_dp(2));
    let (negative, unsigned) = match rounded.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, rounded.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    format!("{}{},{}", if negative { "-" } else { "" }, grouped, frac_part)
}

fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string().replace('.', ",")
}
