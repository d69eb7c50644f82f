use std::io::Write;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{PipelineError, Result};
use crate::models::{AnnotationDocument, ObjectEntry};

/// Serialize a document as Pascal VOC XML (the format labelImg reads)
pub fn to_xml(doc: &AnnotationDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    start(&mut writer, "annotation")?;
    if let Some(folder) = &doc.folder {
        text_element(&mut writer, "folder", folder)?;
    }
    text_element(&mut writer, "filename", &doc.filename)?;
    if let Some(path) = &doc.path {
        text_element(&mut writer, "path", path)?;
    }

    start(&mut writer, "size")?;
    text_element(&mut writer, "width", &doc.size.width.to_string())?;
    text_element(&mut writer, "height", &doc.size.height.to_string())?;
    text_element(&mut writer, "depth", &doc.size.depth.to_string())?;
    end(&mut writer, "size")?;

    for object in &doc.objects {
        write_object(&mut writer, object)?;
    }

    end(&mut writer, "annotation")?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| PipelineError::Xml(e.to_string()))
}

pub fn write_document(doc: &AnnotationDocument, path: &Path) -> Result<()> {
    let xml = to_xml(doc)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_object<W: Write>(writer: &mut Writer<W>, object: &ObjectEntry) -> Result<()> {
    start(writer, "object")?;
    text_element(writer, "name", &object.name)?;
    text_element(writer, "pose", &object.pose)?;
    text_element(writer, "truncated", &object.truncated.to_string())?;
    text_element(writer, "difficult", &object.difficult.to_string())?;

    start(writer, "bndbox")?;
    text_element(writer, "xmin", &object.bndbox.x_min.to_string())?;
    text_element(writer, "ymin", &object.bndbox.y_min.to_string())?;
    text_element(writer, "xmax", &object.bndbox.x_max.to_string())?;
    text_element(writer, "ymax", &object.bndbox.y_max.to_string())?;
    end(writer, "bndbox")?;

    end(writer, "object")
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| PipelineError::Xml(e.to_string()))
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| PipelineError::Xml(e.to_string()))
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| PipelineError::Xml(e.to_string()))?;
    end(writer, name)
}
