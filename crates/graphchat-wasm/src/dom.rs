use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, HtmlButtonElement, HtmlElement, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, KeyboardEvent,
};

/// Get element by ID
pub fn get_element_by_id(document: &Document, id: &str) -> Result<Element, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Element not found: {}", id)))
}

/// Get HTML element by ID
pub fn get_html_element_by_id(document: &Document, id: &str) -> Result<HtmlElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlElement: {}", id)))
}

/// Get input element by ID
pub fn get_input_by_id(document: &Document, id: &str) -> Result<HtmlInputElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlInputElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlInputElement: {}", id)))
}

/// Get textarea element by ID
pub fn get_textarea_by_id(document: &Document, id: &str) -> Result<HtmlTextAreaElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlTextAreaElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlTextAreaElement: {}", id)))
}

/// Get select element by ID
pub fn get_select_by_id(document: &Document, id: &str) -> Result<HtmlSelectElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlSelectElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlSelectElement: {}", id)))
}

/// Get button element by ID
pub fn get_button_by_id(document: &Document, id: &str) -> Result<HtmlButtonElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlButtonElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlButtonElement: {}", id)))
}

/// Create element with class
pub fn create_element_with_class(
    document: &Document,
    tag: &str,
    class: &str,
) -> Result<Element, JsValue> {
    let element = document.create_element(tag)?;
    element.set_class_name(class);
    Ok(element)
}

/// Add click listener to element
pub fn add_click_listener<F>(element: &Element, callback: F) -> Result<(), JsValue>
where
    F: FnMut() + 'static,
{
    use wasm_bindgen::closure::Closure;

    let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
    element.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
    closure.forget(); // Keep the closure alive
    Ok(())
}

/// Add change listener to element
pub fn add_change_listener<F>(element: &Element, callback: F) -> Result<(), JsValue>
where
    F: FnMut() + 'static,
{
    use wasm_bindgen::closure::Closure;

    let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
    element.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Add keydown listener to element
pub fn add_keydown_listener<F>(element: &Element, callback: F) -> Result<(), JsValue>
where
    F: FnMut(KeyboardEvent) + 'static,
{
    use wasm_bindgen::closure::Closure;

    let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(KeyboardEvent)>);
    element.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Show element
pub fn show_element(element: &HtmlElement) {
    let _ = element.style().set_property("display", "block");
}

/// Hide element
pub fn hide_element(element: &HtmlElement) {
    let _ = element.style().set_property("display", "none");
}

/// Remove all children
pub fn clear_element(element: &Element) {
    element.set_inner_html("");
}

/// Scroll element to the bottom
pub fn scroll_to_bottom(element: &Element) {
    element.set_scroll_top(element.scroll_height());
}
