use crate::domain::nfe::{Address, Carrier, NfeDocument, NfeProduct, Party};
use crate::utils::error::{ExportError, Result};
use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;
use std::str::FromStr;

const ROOT_ELEMENTS: [&str; 2] = ["NFe", "nfeProc"];

fn invalid(message: impl Into<String>) -> ExportError {
    ExportError::InvalidNfe {
        message: message.into(),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Streaming NFe reader built on quick-xml.
///
/// Elements are matched by local name, so both namespaced
/// (`xmlns="http://www.portalfiscal.inf.br/nfe"`) and bare documents parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct NfeXmlParser;

impl NfeXmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Well-formed XML whose root element is `NFe` or `nfeProc`.
    pub fn validate_xml(&self, xml: &str) -> bool {
        match check_document(xml) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("NFe XML rejected: {}", e);
                false
            }
        }
    }

    pub fn parse(&self, xml: &str) -> Result<NfeDocument> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut state = ParseState::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = local_name(&e);
                    state.open(&name, &e)?;
                    state.path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = local_name(&e);
                    state.open(&name, &e)?;
                    state.close(&name);
                }
                Ok(Event::End(_)) => {
                    if let Some(name) = state.path.pop() {
                        state.close(&name);
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| invalid(format!("invalid text content: {}", e)))?;
                    state.text(text.trim())?;
                }
                Ok(Event::CData(c)) => {
                    let raw = c.into_inner();
                    let text = String::from_utf8_lossy(&raw);
                    state.text(text.trim())?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(invalid(format!(
                        "malformed XML at position {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
            }
        }

        state.finish()
    }
}

fn check_document(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                root.get_or_insert_with(|| local_name(&e));
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                root.get_or_insert_with(|| local_name(&e));
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(invalid(format!("malformed XML: {}", e))),
        }
    }

    if depth != 0 {
        return Err(invalid("unexpected end of document"));
    }
    match root {
        Some(name) if ROOT_ELEMENTS.contains(&name.as_str()) => Ok(()),
        Some(name) => Err(invalid(format!(
            "root element must be NFe or nfeProc, found '{}'",
            name
        ))),
        None => Err(invalid("document has no root element")),
    }
}

#[derive(Default)]
struct ParseState {
    path: Vec<String>,
    root_checked: bool,
    seen_inf_nfe: bool,
    doc: NfeDocument,
    product: Option<NfeProduct>,
}

impl ParseState {
    fn open(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        if !self.root_checked {
            if !ROOT_ELEMENTS.contains(&name) {
                return Err(invalid(format!(
                    "root element must be NFe or nfeProc, found '{}'",
                    name
                )));
            }
            self.root_checked = true;
        }

        match name {
            "infNFe" => {
                let id = e
                    .try_get_attribute("Id")
                    .map_err(|err| invalid(format!("invalid infNFe attributes: {}", err)))?
                    .ok_or_else(|| invalid("infNFe has no Id attribute"))?;
                let id = id
                    .unescape_value()
                    .map_err(|err| invalid(format!("invalid infNFe Id: {}", err)))?;
                let key = id.strip_prefix("NFe").unwrap_or(&id).trim().to_string();
                if key.is_empty() {
                    return Err(invalid("infNFe Id carries no access key"));
                }
                // 檔名會用到存取金鑰，只接受數字
                if !key.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid(format!(
                        "access key '{}' must contain only digits",
                        key
                    )));
                }
                self.doc.access_key = key;
                self.seen_inf_nfe = true;
            }
            "det" => self.product = Some(NfeProduct::default()),
            "transporta" => {
                self.doc.carrier.get_or_insert_with(Carrier::default);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        if name == "det" {
            if let Some(product) = self.product.take() {
                self.doc.products.push(product);
            }
        }
    }

    fn parent(&self) -> Option<&str> {
        self.path.len().checked_sub(2).map(|i| self.path[i].as_str())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let (Some(parent), Some(leaf)) = (self.parent(), self.path.last()) else {
            return Ok(());
        };
        let (parent, leaf) = (parent.to_string(), leaf.clone());
        let value = text.to_string();

        match (parent.as_str(), leaf.as_str()) {
            ("ide", "dhEmi") => match DateTime::parse_from_rfc3339(text) {
                Ok(dt) => self.doc.issued_at = Some(dt),
                Err(e) => tracing::warn!("⚠️ Ignoring unparseable dhEmi '{}': {}", text, e),
            },
            ("emit", _) => set_party_field(&mut self.doc.issuer, &leaf, value),
            ("enderEmit", _) => set_address_field(&mut self.doc.issuer.address, &leaf, value),
            ("dest", _) => set_party_field(&mut self.doc.recipient, &leaf, value),
            ("enderDest", _) => set_address_field(&mut self.doc.recipient.address, &leaf, value),
            ("prod", _) => {
                if let Some(product) = self.product.as_mut() {
                    match leaf.as_str() {
                        "cProd" => product.code = value,
                        "xProd" => product.description = value,
                        "NCM" => product.ncm = value,
                        "CFOP" => product.cfop = value,
                        "uCom" => product.unit = value,
                        "qCom" => product.quantity = decimal(&leaf, text)?,
                        "vUnCom" => product.unit_value = decimal(&leaf, text)?,
                        "vProd" => product.total_value = decimal(&leaf, text)?,
                        _ => {}
                    }
                }
            }
            ("ICMSTot", _) => {
                let totals = &mut self.doc.totals;
                match leaf.as_str() {
                    "vProd" => totals.products = decimal(&leaf, text)?,
                    "vFrete" => totals.freight = decimal(&leaf, text)?,
                    "vSeg" => totals.insurance = decimal(&leaf, text)?,
                    "vDesc" => totals.discount = decimal(&leaf, text)?,
                    "vIPI" => totals.ipi = decimal(&leaf, text)?,
                    "vNF" => totals.invoice = decimal(&leaf, text)?,
                    _ => {}
                }
            }
            ("transporta", _) => {
                let carrier = self.doc.carrier.get_or_insert_with(Carrier::default);
                match leaf.as_str() {
                    "CNPJ" | "CPF" => carrier.tax_id = value,
                    "xNome" => carrier.name = value,
                    "IE" => carrier.state_registration = value,
                    "xEnder" => carrier.address = value,
                    "xMun" => carrier.city = value,
                    "UF" => carrier.state = value,
                    _ => {}
                }
            }
            ("infAdic", "infCpl") => self.doc.additional_info = Some(value),
            ("infProt", "nProt") => self.doc.authorization_protocol = Some(value),
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<NfeDocument> {
        if !self.path.is_empty() {
            return Err(invalid("unexpected end of document"));
        }
        if !self.root_checked {
            return Err(invalid("document has no root element"));
        }
        if !self.seen_inf_nfe {
            return Err(invalid("infNFe element not found"));
        }
        Ok(self.doc)
    }
}

fn set_party_field(party: &mut Party, leaf: &str, value: String) {
    match leaf {
        "CNPJ" | "CPF" => party.tax_id = value,
        "xNome" => party.name = value,
        "xFant" => party.trade_name = value,
        "IE" => party.state_registration = value,
        _ => {}
    }
}

fn set_address_field(address: &mut Address, leaf: &str, value: String) {
    match leaf {
        "xLgr" => address.street = value,
        "nro" => address.number = value,
        "xBairro" => address.district = value,
        "xMun" => address.city = value,
        "UF" => address.state = value,
        "CEP" => address.zip_code = value,
        _ => {}
    }
}

fn decimal(field: &str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text).map_err(|e| invalid(format!("invalid number in {}: '{}' ({})", field, text, e)))
}
