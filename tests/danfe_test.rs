use anyhow::Result;
use sentry_export::adapters::render::{DanfePageFormat, DanfeRenderer};
use sentry_export::{ExportDirectory, ExportError, GenerateDanfe, NfeXmlParser};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const ACCESS_KEY: &str = "35240112345678000190550010000012341000012345";

fn nfe_xml(product_count: usize) -> String {
    let products: String = (1..=product_count)
        .map(|i| {
            format!(
                r#"<det nItem="{i}"><prod><cProd>P{i:03}</cProd><xProd>Palete tipo {i}</xProd>
                <NCM>44152000</NCM><CFOP>5102</CFOP><uCom>UN</uCom><qCom>1.0000</qCom>
                <vUnCom>100.00</vUnCom><vProd>100.00</vProd></prod></det>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe xmlns="http://www.portalfiscal.inf.br/nfe">
    <infNFe Id="NFe{ACCESS_KEY}" versao="4.00">
      <ide><dhEmi>2024-01-15T10:30:00-03:00</dhEmi></ide>
      <emit><CNPJ>12345678000190</CNPJ><xNome>Madeireira Exemplo Ltda</xNome></emit>
      <dest><CNPJ>98765432000110</CNPJ><xNome>Logística Centro-Oeste SA</xNome></dest>
      {products}
      <total><ICMSTot><vProd>{total}.00</vProd><vNF>{total}.00</vNF></ICMSTot></total>
    </infNFe>
  </NFe>
  <protNFe><infProt><nProt>135240000099999</nProt></infProt></protNFe>
</nfeProc>"#,
        total = product_count * 100
    )
}

#[test]
fn test_danfe_with_25_products_on_a4_has_two_pages() -> Result<()> {
    let temp = TempDir::new()?;
    let use_case = GenerateDanfe::new(
        ExportDirectory::new(temp.path()),
        DanfeRenderer::new(DanfePageFormat::A4),
    );

    let outcome = use_case.execute(&nfe_xml(25))?;

    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.access_key, ACCESS_KEY);
    assert_eq!(outcome.metadata.product_count, 25);
    assert_eq!(outcome.metadata.recipient_cnpj, "98765432000110");
    assert_eq!(outcome.metadata.total_value.to_string(), "2500.00");

    let bytes = std::fs::read(&outcome.file_path)?;
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(String::from_utf8_lossy(&bytes).contains("/Count 2"));
    assert_eq!(outcome.file_size_bytes, bytes.len() as u64);
    Ok(())
}

#[test]
fn test_danfe_on_a5_paginates_by_ten() -> Result<()> {
    let temp = TempDir::new()?;
    let use_case = GenerateDanfe::new(
        ExportDirectory::new(temp.path()),
        DanfeRenderer::new(DanfePageFormat::A5),
    );

    let outcome = use_case.execute(&nfe_xml(25))?;
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.metadata.page_format, "A5");
    Ok(())
}

#[test]
fn test_invalid_nfe_xml() -> Result<()> {
    let temp = TempDir::new()?;
    let use_case = GenerateDanfe::new(ExportDirectory::new(temp.path()), DanfeRenderer::default());

    for xml in ["<nota><id>1</id></nota>", "<NFe><emit></emit></NFe>", "<NFe><infNFe"] {
        let err = use_case.execute(xml).unwrap_err();
        assert!(
            matches!(err, ExportError::InvalidNfe { .. }),
            "expected InvalidNfe for {}",
            xml
        );
    }
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_execute_from_file() -> Result<()> {
    let temp = TempDir::new()?;
    let mut xml_file = NamedTempFile::new()?;
    xml_file.write_all(nfe_xml(3).as_bytes())?;

    let use_case = GenerateDanfe::new(ExportDirectory::new(temp.path()), DanfeRenderer::default());
    let outcome = use_case.execute_from_file(xml_file.path())?;
    assert_eq!(outcome.pages, 1);

    let err = use_case
        .execute_from_file(temp.path().join("nao-existe.xml"))
        .unwrap_err();
    assert!(matches!(err, ExportError::NfeNotFound { .. }));
    Ok(())
}

#[test]
fn test_validate_xml_roots() {
    let parser = NfeXmlParser::new();
    assert!(parser.validate_xml(&nfe_xml(1)));
    assert!(!parser.validate_xml("<nota/>"));
}

#[test]
fn test_access_key_with_path_segments_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let output_dir = temp.path().join("danfes");
    let use_case = GenerateDanfe::new(ExportDirectory::new(&output_dir), DanfeRenderer::default());

    let xml = nfe_xml(1).replace(
        &format!("Id=\"NFe{}\"", ACCESS_KEY),
        "Id=\"NFe/../../escaped\"",
    );
    let err = use_case.execute(&xml).unwrap_err();
    assert!(matches!(err, ExportError::InvalidNfe { .. }));

    assert!(!output_dir.exists());
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}
